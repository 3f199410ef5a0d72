//! 즉시 요약 API.
//!
//! 수집한 게시물을 받아 바로 요약문을 돌려줍니다. 결과는 저장하지 않습니다.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/summarize/news`
//! - `POST /api/v1/summarize/discussions`

use axum::{extract::State, routing::post, Json, Router};
use brief_core::{DiscussionItem, NewsItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::JwtAuth;
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::services::SummaryService;
use crate::state::AppState;

/// 뉴스 요약 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeNewsRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "뉴스 항목이 필요합니다."))]
    pub news_items: Vec<NewsItem>,
    #[validate(length(min = 1, message = "종목명이 필요합니다."))]
    pub stock_name: String,
    /// 기본 프롬프트 대신 사용할 사용자 프롬프트
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

/// 종목토론 요약 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeDiscussionsRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "게시글 항목이 필요합니다."))]
    pub discussion_items: Vec<DiscussionItem>,
    #[validate(length(min = 1, message = "종목명이 필요합니다."))]
    pub stock_name: String,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

/// 요약 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SummarizeResponse {
    pub summary: String,
}

fn summary_service(state: &AppState) -> ApiResult<SummaryService> {
    state
        .summary_service()
        .ok_or_else(|| ApiError::unavailable("요약 기능이 설정되지 않았습니다"))
}

/// 빈 문자열 프롬프트는 지정하지 않은 것으로 봅니다.
fn custom_prompt(prompt: &Option<String>) -> Option<&str> {
    prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
}

/// 뉴스 요약.
#[utoipa::path(
    post,
    path = "/api/v1/summarize/news",
    request_body = SummarizeNewsRequest,
    responses(
        (status = 200, description = "요약 성공", body = SummarizeResponse),
        (status = 400, description = "뉴스 항목 또는 종목명 누락", body = ApiErrorResponse),
        (status = 502, description = "요약 API 실패", body = ApiErrorResponse),
        (status = 503, description = "요약기 미설정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "summarize"
)]
pub async fn summarize_news(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Json(request): Json<SummarizeNewsRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    request.validate()?;
    let service = summary_service(&state)?;

    let summary = service
        .summarize_news(
            request.stock_name.trim(),
            &request.news_items,
            custom_prompt(&request.custom_prompt),
        )
        .await?;

    info!(
        stock_name = %request.stock_name,
        count = request.news_items.len(),
        "News summarized"
    );
    Ok(Json(SummarizeResponse { summary }))
}

/// 종목토론 요약. 관련도 상위 게시글만 프롬프트에 넣습니다.
#[utoipa::path(
    post,
    path = "/api/v1/summarize/discussions",
    request_body = SummarizeDiscussionsRequest,
    responses(
        (status = 200, description = "요약 성공", body = SummarizeResponse),
        (status = 400, description = "게시글 항목 또는 종목명 누락", body = ApiErrorResponse),
        (status = 502, description = "요약 API 실패", body = ApiErrorResponse),
        (status = 503, description = "요약기 미설정", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "summarize"
)]
pub async fn summarize_discussions(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    Json(request): Json<SummarizeDiscussionsRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    request.validate()?;
    let service = summary_service(&state)?;

    let count = request.discussion_items.len();
    let summary = service
        .summarize_discussions(
            request.stock_name.trim(),
            request.discussion_items,
            custom_prompt(&request.custom_prompt),
        )
        .await?;

    info!(stock_name = %request.stock_name, count, "Discussions summarized");
    Ok(Json(SummarizeResponse { summary }))
}

/// 즉시 요약 라우터.
pub fn summarize_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/news", post(summarize_news))
        .route("/discussions", post(summarize_discussions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::routes::test_support::{bearer, json_post, read_json, StubSummarizer};
    use crate::state::create_test_state;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(state: AppState) -> Router {
        Router::new()
            .nest("/api/v1/summarize", summarize_router())
            .with_state(Arc::new(state))
    }

    fn news_body() -> serde_json::Value {
        json!({
            "stockName": "삼성전자",
            "newsItems": [
                {"title": "삼성전자 실적 개선", "content": "영업이익 증가", "url": "https://n.news/1", "date": "2024.03.01", "source": "연합"},
                {"title": "반도체 업황 회복", "content": "", "url": "https://n.news/2", "date": "2024.03.01", "source": "매경"}
            ]
        })
    }

    #[tokio::test]
    async fn test_summarize_news() {
        let stub = Arc::new(StubSummarizer::default());
        let state = create_test_state().with_summarizer(stub.clone());
        let auth = bearer(&state, Role::User);

        let response = app(state)
            .oneshot(json_post("/api/v1/summarize/news", Some(&auth), news_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: SummarizeResponse = read_json(response).await;
        assert_eq!(body.summary, "요약 #1");
        assert_eq!(stub.calls(), 1);

        let prompt = stub.last_prompt().unwrap();
        assert!(prompt.contains("- 삼성전자 실적 개선"));
        assert!(prompt.contains("- 반도체 업황 회복"));
    }

    #[tokio::test]
    async fn test_custom_prompt_used() {
        let stub = Arc::new(StubSummarizer::default());
        let state = create_test_state().with_summarizer(stub.clone());
        let auth = bearer(&state, Role::User);

        let mut body = news_body();
        body["customPrompt"] = json!("한 줄로 요약해줘");
        let response = app(state)
            .oneshot(json_post("/api/v1/summarize/news", Some(&auth), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(stub.last_prompt().as_deref(), Some("한 줄로 요약해줘"));
    }

    #[tokio::test]
    async fn test_empty_items_rejected_without_llm_call() {
        let stub = Arc::new(StubSummarizer::default());
        let state = create_test_state().with_summarizer(stub.clone());
        let auth = bearer(&state, Role::User);

        let response = app(state)
            .oneshot(json_post(
                "/api/v1/summarize/discussions",
                Some(&auth),
                json!({"stockName": "삼성전자", "discussionItems": []}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ApiErrorResponse = read_json(response).await;
        assert_eq!(error.message, "게시글 항목이 필요합니다.");
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_stock_name_rejected() {
        let stub = Arc::new(StubSummarizer::default());
        let state = create_test_state().with_summarizer(stub.clone());
        let auth = bearer(&state, Role::User);

        let mut body = news_body();
        body["stockName"] = json!("");
        let response = app(state)
            .oneshot(json_post("/api/v1/summarize/news", Some(&auth), body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_without_summarizer() {
        let state = create_test_state();
        let auth = bearer(&state, Role::User);

        let response = app(state)
            .oneshot(json_post("/api/v1/summarize/news", Some(&auth), news_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_discussions_limited_to_top_k() {
        let stub = Arc::new(StubSummarizer::default());
        let state = create_test_state().with_summarizer(stub.clone());
        let top_k = state.config.summarizer.top_k;
        let auth = bearer(&state, Role::User);

        let items: Vec<serde_json::Value> = (0..top_k + 3)
            .map(|i| {
                json!({
                    "title": format!("게시글 {}", i),
                    "content": "",
                    "url": format!("https://board/{}", i),
                    "date": "2024.03.01",
                    "author": "개미",
                    "views": i,
                    "likes": 0
                })
            })
            .collect();

        let response = app(state)
            .oneshot(json_post(
                "/api/v1/summarize/discussions",
                Some(&auth),
                json!({"stockName": "삼성전자", "discussionItems": items}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let prompt = stub.last_prompt().unwrap();
        // 조회수가 가장 낮은 게시글은 빠집니다
        assert!(!prompt.contains("- 게시글 0 ("));
        assert!(prompt.contains(&format!("- 게시글 {} (", top_k + 2)));
        assert_eq!(prompt.matches("- 게시글 ").count(), top_k);
    }
}
