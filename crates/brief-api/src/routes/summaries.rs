//! 일별 요약 저장/조회 API.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/summaries/news` - 뉴스 요약 저장 또는 병합
//! - `POST /api/v1/summaries/discussions` - 종목토론 요약 저장 또는 병합
//! - `GET /api/v1/summaries/{kind}/{code}/{date}` - 특정 날짜 요약
//! - `GET /api/v1/summaries/{kind}/{code}?start=&end=` - 기간 요약 목록
//!
//! 날짜를 지정하지 않으면 한국 시간 기준 오늘 날짜를 사용합니다.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use brief_core::{DiscussionItem, NewsItem, Summary, SummaryKind};
use chrono::{Duration, NaiveDate, Utc};
use chrono_tz::Asia::Seoul;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::validate_stock_code;
use crate::auth::JwtAuth;
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::services::SummaryService;
use crate::state::AppState;

/// 기간 조회에서 시작일을 생략했을 때의 조회 일수.
const DEFAULT_LIST_DAYS: i64 = 30;

/// 한국 시간 기준 오늘.
fn today_kst() -> NaiveDate {
    Utc::now().with_timezone(&Seoul).date_naive()
}

fn parse_date(value: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("날짜 형식은 YYYY-MM-DD여야 합니다: {}", value)))
}

fn parse_kind(value: &str) -> ApiResult<SummaryKind> {
    Ok(value.parse::<SummaryKind>()?)
}

fn ensure_stock_code(code: &str) -> ApiResult<()> {
    validate_stock_code(code).map_err(|_| ApiError::validation("종목코드는 6자리 숫자여야 합니다"))
}

/// 뉴스 요약 저장 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewsSummaryRequest {
    #[validate(custom(function = "validate_stock_code"))]
    pub stock_code: String,
    #[validate(length(min = 1, message = "종목명이 필요합니다."))]
    pub stock_name: String,
    /// 요약 기준일 (YYYY-MM-DD, 기본: 오늘)
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(min = 1, message = "뉴스 항목이 필요합니다."))]
    pub news_items: Vec<NewsItem>,
}

/// 종목토론 요약 저장 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscussionSummaryRequest {
    #[validate(custom(function = "validate_stock_code"))]
    pub stock_code: String,
    #[validate(length(min = 1, message = "종목명이 필요합니다."))]
    pub stock_name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(min = 1, message = "게시글 항목이 필요합니다."))]
    pub discussion_items: Vec<DiscussionItem>,
}

/// 기간 조회 쿼리.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListSummariesQuery {
    /// 시작일 (YYYY-MM-DD, 기본: 종료일 30일 전)
    pub start: Option<String>,
    /// 종료일 (YYYY-MM-DD, 기본: 오늘)
    pub end: Option<String>,
}

/// 기간 요약 목록 응답 (날짜 내림차순).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummaryListResponse {
    pub summaries: Vec<Summary>,
}

fn summary_service(state: &AppState) -> ApiResult<SummaryService> {
    state
        .summary_service()
        .ok_or_else(|| ApiError::unavailable("요약 기능이 설정되지 않았습니다"))
}

/// 뉴스 요약 저장.
///
/// 같은 날짜의 요약이 있으면 처음 보는 기사만 병합합니다. 모두 반영된 기사라면
/// 요약 모델을 호출하지 않고 기존 요약을 그대로 반환합니다.
#[utoipa::path(
    post,
    path = "/api/v1/summaries/news",
    request_body = NewsSummaryRequest,
    responses(
        (status = 200, description = "저장 또는 병합된 요약", body = Summary),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 502, description = "요약 API 실패", body = ApiErrorResponse),
        (status = 503, description = "요약기 미설정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "summaries"
)]
pub async fn upsert_news_summary(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Json(request): Json<NewsSummaryRequest>,
) -> ApiResult<Json<Summary>> {
    request.validate()?;
    let service = summary_service(&state)?;
    let date = request.date.unwrap_or_else(today_kst);

    let summary = service
        .upsert_news(
            &request.stock_code,
            request.stock_name.trim(),
            date,
            request.news_items,
        )
        .await?;
    Ok(Json(summary))
}

/// 종목토론 요약 저장.
#[utoipa::path(
    post,
    path = "/api/v1/summaries/discussions",
    request_body = DiscussionSummaryRequest,
    responses(
        (status = 200, description = "저장 또는 병합된 요약", body = Summary),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 502, description = "요약 API 실패", body = ApiErrorResponse),
        (status = 503, description = "요약기 미설정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "summaries"
)]
pub async fn upsert_discussion_summary(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Json(request): Json<DiscussionSummaryRequest>,
) -> ApiResult<Json<Summary>> {
    request.validate()?;
    let service = summary_service(&state)?;
    let date = request.date.unwrap_or_else(today_kst);

    let summary = service
        .upsert_discussions(
            &request.stock_code,
            request.stock_name.trim(),
            date,
            request.discussion_items,
        )
        .await?;
    Ok(Json(summary))
}

/// 특정 날짜 요약 조회.
#[utoipa::path(
    get,
    path = "/api/v1/summaries/{kind}/{code}/{date}",
    params(
        ("kind" = String, Path, description = "news | discussion"),
        ("code" = String, Path, description = "종목코드"),
        ("date" = String, Path, description = "YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "요약", body = Summary),
        (status = 400, description = "잘못된 경로 값", body = ApiErrorResponse),
        (status = 404, description = "요약 없음", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "summaries"
)]
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Path((kind, code, date)): Path<(String, String, String)>,
) -> ApiResult<Json<Summary>> {
    let kind = parse_kind(&kind)?;
    ensure_stock_code(&code)?;
    let date = parse_date(&date)?;

    state
        .summary_store
        .get(kind, &code, date)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("요약을 찾을 수 없습니다"))
}

/// 기간 요약 목록.
#[utoipa::path(
    get,
    path = "/api/v1/summaries/{kind}/{code}",
    params(
        ("kind" = String, Path, description = "news | discussion"),
        ("code" = String, Path, description = "종목코드"),
        ListSummariesQuery
    ),
    responses(
        (status = 200, description = "요약 목록", body = SummaryListResponse),
        (status = 400, description = "잘못된 기간", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "summaries"
)]
pub async fn list_summaries(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Path((kind, code)): Path<(String, String)>,
    Query(query): Query<ListSummariesQuery>,
) -> ApiResult<Json<SummaryListResponse>> {
    let kind = parse_kind(&kind)?;
    ensure_stock_code(&code)?;

    let end = match query.end.as_deref() {
        Some(end) => parse_date(end)?,
        None => today_kst(),
    };
    let start = match query.start.as_deref() {
        Some(start) => parse_date(start)?,
        None => end - Duration::days(DEFAULT_LIST_DAYS - 1),
    };
    if start > end {
        return Err(ApiError::validation(format!(
            "시작일({})이 종료일({})보다 늦을 수 없습니다",
            start, end
        )));
    }

    let summaries = state.summary_store.list_range(kind, &code, start, end).await?;
    debug!(%kind, stock_code = %code, %start, %end, count = summaries.len(), "Summaries listed");
    Ok(Json(SummaryListResponse { summaries }))
}

/// 요약 라우터.
pub fn summaries_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/news", post(upsert_news_summary))
        .route("/discussions", post(upsert_discussion_summary))
        .route("/{kind}/{code}", get(list_summaries))
        .route("/{kind}/{code}/{date}", get(get_summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::routes::test_support::{bearer, get as get_req, json_post, read_json, StubSummarizer};
    use crate::state::create_test_state;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .nest("/api/v1/summaries", summaries_router())
            .with_state(state)
    }

    fn news(url: &str, title: &str) -> serde_json::Value {
        json!({"title": title, "content": "", "url": url, "date": "2024.03.01", "source": "연합"})
    }

    fn news_request(items: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "stockCode": "005930",
            "stockName": "삼성전자",
            "date": "2024-03-01",
            "newsItems": items
        })
    }

    fn setup() -> (Arc<AppState>, Arc<StubSummarizer>, String) {
        let stub = Arc::new(StubSummarizer::default());
        let state = create_test_state().with_summarizer(stub.clone());
        let auth = bearer(&state, Role::User);
        (Arc::new(state), stub, auth)
    }

    #[tokio::test]
    async fn test_upsert_then_merge() {
        let (state, stub, auth) = setup();

        let response = app(state.clone())
            .oneshot(json_post(
                "/api/v1/summaries/news",
                Some(&auth),
                news_request(vec![news("https://n/1", "실적 발표"), news("https://n/2", "배당 확대")]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let first: Summary = read_json(response).await;
        assert_eq!(first.item_count, 2);
        assert_eq!(first.summary_content, "요약 #1");

        let response = app(state.clone())
            .oneshot(json_post(
                "/api/v1/summaries/news",
                Some(&auth),
                news_request(vec![news("https://n/2", "배당 확대"), news("https://n/3", "신규 공장")]),
            ))
            .await
            .unwrap();
        let merged: Summary = read_json(response).await;

        assert_eq!(merged.id, first.id);
        assert_eq!(merged.item_count, 3);
        assert_eq!(merged.summary_content, "요약 #2");
        let prompt = stub.last_prompt().unwrap();
        assert!(prompt.contains("요약 #1"));
        assert!(prompt.contains("- 신규 공장"));
        assert!(!prompt.contains("- 배당 확대"));
    }

    #[tokio::test]
    async fn test_repeated_batch_is_unchanged() {
        let (state, stub, auth) = setup();
        let body = news_request(vec![news("https://n/1", "실적 발표")]);

        let response = app(state.clone())
            .oneshot(json_post("/api/v1/summaries/news", Some(&auth), body.clone()))
            .await
            .unwrap();
        let first: Summary = read_json(response).await;

        let response = app(state.clone())
            .oneshot(json_post("/api/v1/summaries/news", Some(&auth), body))
            .await
            .unwrap();
        let second: Summary = read_json(response).await;

        assert_eq!(first, second);
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let (state, _stub, auth) = setup();

        for date in ["2024-03-01", "2024-03-03"] {
            let mut body = news_request(vec![news(&format!("https://n/{}", date), "기사")]);
            body["date"] = json!(date);
            let response = app(state.clone())
                .oneshot(json_post("/api/v1/summaries/news", Some(&auth), body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app(state.clone())
            .oneshot(get_req("/api/v1/summaries/news/005930/2024-03-01", Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let found: Summary = read_json(response).await;
        assert_eq!(found.summary_date.to_string(), "2024-03-01");

        let response = app(state.clone())
            .oneshot(get_req("/api/v1/summaries/discussion/005930/2024-03-01", Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(state.clone())
            .oneshot(get_req(
                "/api/v1/summaries/news/005930?start=2024-03-01&end=2024-03-31",
                Some(&auth),
            ))
            .await
            .unwrap();
        let list: SummaryListResponse = read_json(response).await;
        let dates: Vec<String> = list.summaries.iter().map(|s| s.summary_date.to_string()).collect();
        assert_eq!(dates, vec!["2024-03-03", "2024-03-01"]);
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let (state, _stub, auth) = setup();

        let cases = [
            "/api/v1/summaries/weekly/005930/2024-03-01",
            "/api/v1/summaries/news/005930/2024-13-01",
            "/api/v1/summaries/news/ABC/2024-03-01",
            "/api/v1/summaries/news/005930?start=2024-03-05&end=2024-03-01",
        ];
        for uri in cases {
            let response = app(state.clone()).oneshot(get_req(uri, Some(&auth))).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_upsert_requires_summarizer() {
        let state = create_test_state();
        let auth = bearer(&state, Role::User);

        let response = app(Arc::new(state))
            .oneshot(json_post(
                "/api/v1/summaries/news",
                Some(&auth),
                news_request(vec![news("https://n/1", "기사")]),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let (state, stub, auth) = setup();

        let response = app(state)
            .oneshot(json_post("/api/v1/summaries/news", Some(&auth), news_request(vec![])))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stub.calls(), 0);
    }
}
