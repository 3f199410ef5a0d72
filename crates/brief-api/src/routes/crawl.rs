//! 네이버 금융 수집 API.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/crawl/news` - 종목 뉴스 수집
//! - `POST /api/v1/crawl/discussions` - 종목토론방 게시글 수집
//!
//! 페이지 범위는 네트워크 요청 전에 검증됩니다. 수집 결과가 비어 있으면 404를
//! 반환합니다.

use axum::{extract::State, routing::post, Json, Router};
use brief_core::{DiscussionItem, NewsItem, PageRange, StockInfo};
use brief_data::StockMasterRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::validate_stock_code;
use crate::auth::JwtAuth;
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::metrics::record_crawled_items;
use crate::state::AppState;

/// 종목 마스터에 없을 때 사용하는 시장 구분.
const DEFAULT_MARKET: &str = "KOSPI";

fn default_page() -> u32 {
    1
}

/// 수집 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    /// 종목코드 (6자리)
    #[validate(custom(function = "validate_stock_code"))]
    pub stock_code: String,
    /// 시작 페이지 (1부터)
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "시작 페이지는 1 이상이어야 합니다"))]
    pub start_page: u32,
    /// 끝 페이지 (포함)
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "끝 페이지는 1 이상이어야 합니다"))]
    pub end_page: u32,
}

/// 뉴스 수집 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsCrawlResponse {
    pub news_items: Vec<NewsItem>,
    pub stock_info: StockInfo,
}

/// 종목토론 수집 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionCrawlResponse {
    pub discussion_items: Vec<DiscussionItem>,
    pub stock_info: StockInfo,
}

impl CrawlRequest {
    fn page_range(&self, max_pages: u32) -> ApiResult<PageRange> {
        self.validate()?;
        Ok(PageRange::bounded(self.start_page, self.end_page, max_pages)?)
    }
}

/// 응답에 넣을 종목 정보.
///
/// 종목 마스터 → 크롤링한 종목명 → 종목코드 순으로 이름을 정합니다.
async fn resolve_stock_info(state: &AppState, code: &str, crawled_name: Option<String>) -> StockInfo {
    if let Some(pool) = &state.db_pool {
        match StockMasterRepository::get_by_code(pool, code).await {
            Ok(Some(info)) => return info,
            Ok(None) => {}
            Err(e) => warn!(stock_code = code, error = %e, "Stock master lookup failed"),
        }
    }
    let name = crawled_name.unwrap_or_else(|| code.to_string());
    StockInfo::new(code, name, DEFAULT_MARKET)
}

/// 종목 뉴스 수집.
#[utoipa::path(
    post,
    path = "/api/v1/crawl/news",
    request_body = CrawlRequest,
    responses(
        (status = 200, description = "수집 성공", body = NewsCrawlResponse),
        (status = 400, description = "잘못된 종목코드 또는 페이지 범위", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 404, description = "뉴스 없음", body = ApiErrorResponse),
        (status = 502, description = "포털 요청 실패", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "crawl"
)]
pub async fn crawl_news(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Json(request): Json<CrawlRequest>,
) -> ApiResult<Json<NewsCrawlResponse>> {
    let range = request.page_range(state.config.crawler.max_pages)?;
    let code = request.stock_code.as_str();

    let crawled = state.crawler.fetch_news(code, range).await?;
    if crawled.items.is_empty() {
        return Err(ApiError::not_found("뉴스를 찾을 수 없습니다."));
    }

    record_crawled_items("news", crawled.items.len());
    info!(stock_code = code, count = crawled.items.len(), %range, "News crawled");

    let stock_info = resolve_stock_info(&state, code, crawled.stock_name).await;
    Ok(Json(NewsCrawlResponse {
        news_items: crawled.items,
        stock_info,
    }))
}

/// 종목토론방 게시글 수집.
#[utoipa::path(
    post,
    path = "/api/v1/crawl/discussions",
    request_body = CrawlRequest,
    responses(
        (status = 200, description = "수집 성공", body = DiscussionCrawlResponse),
        (status = 400, description = "잘못된 종목코드 또는 페이지 범위", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 404, description = "게시글 없음", body = ApiErrorResponse),
        (status = 502, description = "포털 요청 실패", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "crawl"
)]
pub async fn crawl_discussions(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Json(request): Json<CrawlRequest>,
) -> ApiResult<Json<DiscussionCrawlResponse>> {
    let range = request.page_range(state.config.crawler.max_pages)?;
    let code = request.stock_code.as_str();

    let crawled = state.crawler.fetch_discussions(code, range).await?;
    if crawled.items.is_empty() {
        return Err(ApiError::not_found("게시글을 찾을 수 없습니다."));
    }

    record_crawled_items("discussion", crawled.items.len());
    info!(stock_code = code, count = crawled.items.len(), %range, "Discussions crawled");

    let stock_info = resolve_stock_info(&state, code, crawled.stock_name).await;
    Ok(Json(DiscussionCrawlResponse {
        discussion_items: crawled.items,
        stock_info,
    }))
}

/// 수집 라우터.
pub fn crawl_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/news", post(crawl_news))
        .route("/discussions", post(crawl_discussions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::routes::test_support::{bearer, json_post, read_json};
    use crate::state::create_test_state;
    use axum::http::StatusCode;
    use brief_core::{CrawlerConfig, CONTENT_UNAVAILABLE};
    use brief_data::{NaverCrawler, RequestLimiter};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tower::ServiceExt;

    const HTML_UTF8: &str = "text/html; charset=utf-8";

    fn app(state: AppState) -> Router {
        Router::new()
            .nest("/api/v1/crawl", crawl_router())
            .with_state(Arc::new(state))
    }

    fn state_with_portal(base_url: &str) -> AppState {
        let config = CrawlerConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        let crawler = NaverCrawler::with_limiter(&config, RequestLimiter::unlimited()).unwrap();
        create_test_state().with_crawler(crawler)
    }

    #[tokio::test]
    async fn test_requires_token() {
        let response = app(create_test_state())
            .oneshot(json_post(
                "/api/v1/crawl/news",
                None,
                json!({"stockCode": "005930", "startPage": 1, "endPage": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_reversed_page_range_rejected() {
        let state = create_test_state();
        let auth = bearer(&state, Role::User);

        let response = app(state)
            .oneshot(json_post(
                "/api/v1/crawl/news",
                Some(&auth),
                json!({"stockCode": "005930", "startPage": 3, "endPage": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = read_json(response).await;
        assert_eq!(error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_invalid_stock_code_rejected() {
        let state = create_test_state();
        let auth = bearer(&state, Role::User);

        let response = app(state)
            .oneshot(json_post(
                "/api/v1/crawl/discussions",
                Some(&auth),
                json!({"stockCode": "SAMSUNG", "startPage": 1, "endPage": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = read_json(response).await;
        assert_eq!(error.message, "종목코드는 6자리 숫자여야 합니다");
    }

    #[tokio::test]
    async fn test_too_many_pages_rejected() {
        let state = create_test_state();
        let auth = bearer(&state, Role::User);
        let end = state.config.crawler.max_pages + 1;

        let response = app(state)
            .oneshot(json_post(
                "/api/v1/crawl/news",
                Some(&auth),
                json!({"stockCode": "005930", "startPage": 1, "endPage": end}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_crawl_news_success() {
        let mut server = Server::new_async().await;
        let _main = server
            .mock("GET", "/item/main.naver")
            .match_query(Matcher::Any)
            .with_header("content-type", HTML_UTF8)
            .with_body(r#"<div class="wrap_company"><h2><a>삼성전자</a></h2></div>"#)
            .create_async()
            .await;
        let list = server
            .mock("GET", "/item/news_news.naver")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("code".into(), "005930".into()),
                Matcher::UrlEncoded("page".into(), "1".into()),
            ]))
            .with_header("content-type", HTML_UTF8)
            .with_body(
                r#"<table class="type5">
                    <tr><th>제목</th></tr>
                    <tr><td class="title"><a href="/news/1">삼성전자 실적 발표</a></td><td class="info">연합</td><td class="date">2024.03.01 09:00</td></tr>
                </table>"#,
            )
            .create_async()
            .await;
        let _body = server
            .mock("GET", "/news/1")
            .with_status(404)
            .create_async()
            .await;

        let state = state_with_portal(&server.url());
        let auth = bearer(&state, Role::User);
        let response = app(state)
            .oneshot(json_post(
                "/api/v1/crawl/news",
                Some(&auth),
                json!({"stockCode": "005930", "startPage": 1, "endPage": 1}),
            ))
            .await
            .unwrap();

        list.assert_async().await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: NewsCrawlResponse = read_json(response).await;
        assert_eq!(body.news_items.len(), 1);
        assert_eq!(body.news_items[0].title, "삼성전자 실적 발표");
        assert_eq!(body.news_items[0].content, CONTENT_UNAVAILABLE);
        assert_eq!(body.stock_info, StockInfo::new("005930", "삼성전자", "KOSPI"));
    }

    #[tokio::test]
    async fn test_empty_board_is_not_found() {
        let mut server = Server::new_async().await;
        let _main = server
            .mock("GET", "/item/main.naver")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let _list = server
            .mock("GET", "/item/board.naver")
            .match_query(Matcher::Any)
            .with_header("content-type", HTML_UTF8)
            .with_body(r#"<table class="type2"><tr><th>날짜</th></tr></table>"#)
            .create_async()
            .await;

        let state = state_with_portal(&server.url());
        let auth = bearer(&state, Role::User);
        let response = app(state)
            .oneshot(json_post(
                "/api/v1/crawl/discussions",
                Some(&auth),
                json!({"stockCode": "005930"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ApiErrorResponse = read_json(response).await;
        assert_eq!(error.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_portal_failure_is_bad_gateway() {
        let mut server = Server::new_async().await;
        let _main = server
            .mock("GET", "/item/main.naver")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let _list = server
            .mock("GET", "/item/news_news.naver")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let state = state_with_portal(&server.url());
        let auth = bearer(&state, Role::User);
        let response = app(state)
            .oneshot(json_post(
                "/api/v1/crawl/news",
                Some(&auth),
                json!({"stockCode": "005930", "startPage": 1, "endPage": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
