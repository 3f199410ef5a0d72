//! 증권사 API 에러 타입.

use brief_core::BriefError;
use thiserror::Error;

/// 증권사 API 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 잘못된 요청 파라미터
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_) | ExchangeError::RateLimited | ExchangeError::Timeout(_)
        )
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<ExchangeError> for BriefError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::InvalidRequest(msg) => BriefError::InvalidInput(msg),
            ExchangeError::RateLimited => BriefError::RateLimit(err.to_string()),
            ExchangeError::NetworkError(_) | ExchangeError::Timeout(_) => {
                BriefError::Network(err.to_string())
            }
            ExchangeError::ParseError(msg) => BriefError::Parse(msg),
            other => BriefError::Upstream(other.to_string()),
        }
    }
}
