//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/auth` - 회원가입, 로그인, 내 정보
//! - `/api/v1/crawl` - 네이버 금융 뉴스/종목토론 수집
//! - `/api/v1/summarize` - 저장 없는 즉시 요약
//! - `/api/v1/summaries` - 일별 요약 저장/병합/조회
//! - `/api/v1/stocks` - 종목 검색, 차트, 종목 마스터 업로드
//!
//! `/health`와 `/api/v1/auth`의 가입/로그인을 제외한 엔드포인트는 Bearer 토큰이
//! 필요합니다.

pub mod auth;
pub mod crawl;
pub mod health;
pub mod stocks;
pub mod summaries;
pub mod summarize;

pub use auth::{auth_router, AuthRequest};
pub use crawl::{crawl_router, CrawlRequest, DiscussionCrawlResponse, NewsCrawlResponse};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use stocks::{stocks_router, ChartParams, ChartResponse, MasterUploadResponse, StockSearchResponse};
pub use summaries::{summaries_router, SummaryListResponse};
pub use summarize::{summarize_router, SummarizeResponse};

use axum::Router;
use brief_core::is_valid_stock_code;
use std::sync::Arc;
use validator::ValidationError;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/auth", auth_router())
        .nest("/api/v1/crawl", crawl_router())
        .nest("/api/v1/summarize", summarize_router())
        .nest("/api/v1/summaries", summaries_router())
        .nest("/api/v1/stocks", stocks_router())
}

/// 종목코드 검증 (6자리 숫자).
pub(crate) fn validate_stock_code(code: &str) -> Result<(), ValidationError> {
    if !is_valid_stock_code(code) {
        return Err(ValidationError::new("invalid_stock_code")
            .with_message("종목코드는 6자리 숫자여야 합니다".into()));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stock_code() {
        assert!(validate_stock_code("005930").is_ok());
        assert!(validate_stock_code("5930").is_err());
        assert!(validate_stock_code("00593A").is_err());
    }
}
