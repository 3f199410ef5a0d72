//! 한국투자증권 (KIS) Open API 연동 모듈.
//!
//! # 기능
//!
//! - OAuth 2.0 접근 토큰 발급 및 공유 캐시
//! - 국내 주식 일별 시세 조회
//! - 국내 주식 분봉 조회
//!
//! # API 문서
//!
//! 공식 API 문서: <https://apiportal.koreainvestment.com/>
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use brief_exchange::kis::{KisChartClient, KisConfig};
//!
//! let config = KisConfig::new("app_key", "app_secret");
//! let client = KisChartClient::new(config)?;
//!
//! let (start, end) = KisChartClient::default_daily_window();
//! let candles = client.daily_chart("005930", start, end).await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;

pub use auth::{TokenCache, TokenState};
pub use client::{ChartData, ChartQuery, DailyCandle, KisChartClient, MinuteCandle};
pub use config::{KisConfig, KisEnvironment};

/// 거래 ID (tr_id).
pub mod tr_id {
    /// 국내 주식 일별 시세
    pub const KR_DAILY_PRICE: &str = "FHKST01010400";
    /// 국내 주식 당일 분봉
    pub const KR_MINUTE_CHART: &str = "FHKST03010200";
}
