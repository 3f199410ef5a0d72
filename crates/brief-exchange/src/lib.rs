//! 증권사 시세 API 연동.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 한국투자증권 OAuth 2.0 접근 토큰 발급 및 캐싱
//! - 국내 주식 일봉/분봉 차트 조회

pub mod error;
pub mod kis;

pub use error::*;
pub use kis::{
    ChartData, ChartQuery, DailyCandle, KisChartClient, KisConfig, KisEnvironment, MinuteCandle,
    TokenCache, TokenState,
};
