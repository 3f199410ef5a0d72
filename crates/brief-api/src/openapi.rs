//! OpenAPI 문서화 설정.
//!
//! utoipa로 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use brief_core::{DiscussionItem, NewsItem, StockInfo, Summary, SummaryKind};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{Role, TokenPair};
use crate::error::ApiErrorResponse;
use crate::routes::{
    auth::{LoginRequest, MeResponse, RefreshRequest},
    summaries::{DiscussionSummaryRequest, NewsSummaryRequest},
    summarize::{SummarizeDiscussionsRequest, SummarizeNewsRequest},
    AuthRequest, ChartResponse, ComponentHealth, ComponentStatus, CrawlRequest,
    DiscussionCrawlResponse, HealthResponse, MasterUploadResponse, NewsCrawlResponse,
    StockSearchResponse, SummarizeResponse, SummaryListResponse,
};

/// Bearer 인증 스킴 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Stock Brief API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stock Brief API",
        version = "0.1.0",
        description = r#"
# Stock Brief REST API

네이버 금융 뉴스/종목토론을 수집하고 LLM으로 요약해 종목별 일일 브리핑을 만듭니다.

## 주요 기능

- **수집**: 종목 뉴스와 종목토론 게시글 크롤링
- **요약**: 저장 없는 즉시 요약과 일별 요약 저장/병합
- **종목**: 종목 검색, KIS 일봉/분봉 차트, 종목 마스터 업로드

## 인증

가입/로그인과 헬스 체크를 제외한 엔드포인트는 JWT Bearer 토큰이 필요합니다.
`Authorization: Bearer <token>` 헤더를 포함하세요.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "/", description = "현재 서버")
    ),
    tags(
        (name = "health", description = "헬스 체크"),
        (name = "auth", description = "회원가입/로그인"),
        (name = "crawl", description = "네이버 금융 수집"),
        (name = "summarize", description = "즉시 요약"),
        (name = "summaries", description = "일별 요약 저장/조회"),
        (name = "stocks", description = "종목 검색, 차트, 마스터")
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            // 공통
            ApiErrorResponse,
            NewsItem,
            DiscussionItem,
            StockInfo,
            Summary,
            SummaryKind,
            // Health
            HealthResponse,
            ComponentHealth,
            ComponentStatus,
            // Auth
            AuthRequest,
            LoginRequest,
            RefreshRequest,
            MeResponse,
            TokenPair,
            Role,
            // Crawl
            CrawlRequest,
            NewsCrawlResponse,
            DiscussionCrawlResponse,
            // Summarize
            SummarizeNewsRequest,
            SummarizeDiscussionsRequest,
            SummarizeResponse,
            // Summaries
            NewsSummaryRequest,
            DiscussionSummaryRequest,
            SummaryListResponse,
            // Stocks
            StockSearchResponse,
            ChartResponse,
            MasterUploadResponse,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::me,

        // ===== Crawl =====
        crate::routes::crawl::crawl_news,
        crate::routes::crawl::crawl_discussions,

        // ===== Summarize =====
        crate::routes::summarize::summarize_news,
        crate::routes::summarize::summarize_discussions,

        // ===== Summaries =====
        crate::routes::summaries::upsert_news_summary,
        crate::routes::summaries::upsert_discussion_summary,
        crate::routes::summaries::get_summary,
        crate::routes::summaries::list_summaries,

        // ===== Stocks =====
        crate::routes::stocks::search_stocks,
        crate::routes::stocks::get_chart,
        crate::routes::stocks::upload_master,
    )
)]
pub struct ApiDoc;

/// Swagger UI 라우터 생성.
///
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
