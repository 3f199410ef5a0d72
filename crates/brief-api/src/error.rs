//! 통합 API 에러 응답 타입.
//!
//! 각 크레이트의 에러를 HTTP 상태 코드와 `{code, message}` 본문으로 변환합니다.
//!
//! | 분류 | 상태 코드 |
//! |------|-----------|
//! | 입력 검증 실패 | 400 |
//! | 인증/권한 | 401 / 403 |
//! | 결과 없음 | 404 |
//! | 요청 한도 초과 | 429 |
//! | 저장소/내부 오류 | 500 |
//! | 외부 서비스 (포털, LLM, 증권사) | 502 |
//! | 미설정 의존성 | 503 |

use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use brief_core::BriefError;
use brief_data::{CrawlError, DataError};
use brief_exchange::ExchangeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};
use utoipa::ToSchema;
use validator::ValidationErrors;

/// API 에러 응답 본문.
///
/// ```json
/// {
///   "code": "NOT_FOUND",
///   "message": "요약을 찾을 수 없습니다",
///   "timestamp": 1709251200
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "VALIDATION_ERROR", "NOT_FOUND", "UPSTREAM_ERROR")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// HTTP 메서드
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// 요청 경로
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ApiErrorResponse {
    /// 타임스탬프가 포함된 에러 생성.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Some(chrono::Utc::now().timestamp()),
            ..Self::simple(code, message)
        }
    }

    /// `{code, message}`만 있는 에러.
    pub fn simple(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: None,
            method: None,
            path: None,
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// 요청 정보(메서드, 경로)를 추가합니다.
    #[must_use]
    pub fn with_request_info(mut self, method: &Method, uri: &Uri) -> Self {
        self.method = Some(method.to_string());
        self.path = Some(uri.path().to_string());
        self
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 상태 코드가 붙은 API 에러.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiErrorResponse,
}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorResponse::new(code, message),
        }
    }

    /// 400 입력 검증 실패.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    /// 404 결과 없음.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    /// 401 인증 실패.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// 409 중복.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// 503 의존성 미설정.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// 500 내부 오류.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ApiError> for (StatusCode, Json<ApiErrorResponse>) {
    fn from(err: ApiError) -> Self {
        (err.status, Json(err.body))
    }
}

impl From<BriefError> for ApiError {
    fn from(err: BriefError) -> Self {
        match err {
            BriefError::InvalidInput(msg) => Self::validation(msg),
            BriefError::NoContent => Self::validation(BriefError::NoContent.to_string()),
            BriefError::NotFound(msg) => Self::not_found(msg),
            BriefError::Auth(msg) => Self::unauthorized(msg),
            BriefError::RateLimit(msg) => {
                warn!(error = %msg, "Upstream rate limit");
                Self::new(
                    StatusCode::TOO_MANY_REQUESTS,
                    "RATE_LIMITED",
                    "요청 한도를 초과했습니다. 잠시 후 다시 시도해주세요.",
                )
            }
            BriefError::Upstream(_) | BriefError::Network(_) | BriefError::Parse(_) => {
                error!(error = %err, "Upstream failure");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "외부 서비스 호출에 실패했습니다",
                )
            }
            BriefError::Database(_) => {
                error!(error = %err, "Storage failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DB_ERROR",
                    "데이터 저장소 처리 중 오류가 발생했습니다",
                )
            }
            BriefError::Config(_) | BriefError::Serialization(_) | BriefError::Internal(_) => {
                error!(error = %err, "Internal failure");
                Self::internal("서버 내부 오류가 발생했습니다")
            }
        }
    }
}

impl From<CrawlError> for ApiError {
    fn from(err: CrawlError) -> Self {
        BriefError::from(err).into()
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        BriefError::from(err).into()
    }
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        BriefError::from(err).into()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation(validation_message(&errors))
    }
}

/// 필드 검증 에러를 하나의 메시지로 합칩니다.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: 유효하지 않은 값", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_simple_json_has_code_and_message_only() {
        let error = ApiErrorResponse::simple("NOT_FOUND", "없음");
        let json = serde_json::to_string(&error).unwrap();

        assert_eq!(json, r#"{"code":"NOT_FOUND","message":"없음"}"#);
    }

    #[test]
    fn test_with_request_info() {
        let uri: Uri = "/api/v1/summaries/news/005930".parse().unwrap();
        let error = ApiErrorResponse::new("NOT_FOUND", "요약 없음")
            .with_request_info(&Method::GET, &uri);

        assert_eq!(error.method.as_deref(), Some("GET"));
        assert_eq!(error.path.as_deref(), Some("/api/v1/summaries/news/005930"));
        assert!(error.timestamp.is_some());
    }

    #[test]
    fn test_brief_error_status_mapping() {
        let cases = vec![
            (BriefError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (BriefError::NoContent, StatusCode::BAD_REQUEST),
            (BriefError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (BriefError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (BriefError::RateLimit("x".into()), StatusCode::TOO_MANY_REQUESTS),
            (BriefError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (BriefError::Network("x".into()), StatusCode::BAD_GATEWAY),
            (BriefError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (BriefError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, expected, "{}", api.body);
        }
    }

    #[test]
    fn test_upstream_message_is_generic() {
        let api: ApiError = BriefError::Upstream("sk-secret leaked in body".into()).into();
        assert!(!api.body.message.contains("sk-secret"));
        assert_eq!(api.body.code, "UPSTREAM_ERROR");
    }

    #[test]
    fn test_no_content_message() {
        let api: ApiError = BriefError::NoContent.into();
        assert_eq!(api.body.message, "요약할 내용이 없습니다");
    }

    #[test]
    fn test_crawl_and_exchange_errors() {
        let api: ApiError = CrawlError::InvalidRequest("page".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);

        let api: ApiError = CrawlError::Status(503).into();
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);

        let api: ApiError = ExchangeError::InvalidRequest("count".into()).into();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);

        let api: ApiError = DataError::PoolExhausted.into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "이름은 필수입니다"))]
        name: String,
        #[validate(range(min = 1, message = "페이지는 1 이상이어야 합니다"))]
        page: u32,
    }

    #[test]
    fn test_validation_errors_joined() {
        let sample = Sample {
            name: String::new(),
            page: 0,
        };
        let api: ApiError = sample.validate().unwrap_err().into();

        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            api.body.message,
            "이름은 필수입니다; 페이지는 1 이상이어야 합니다"
        );
    }
}
