//! 요약 서비스 공통 에러 타입.
//!
//! 크롤링, 요약, 저장 단계 전반에서 사용되는 에러 분류를 정의합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum BriefError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (검증 실패)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 요약할 내용 없음
    #[error("요약할 내용이 없습니다")]
    NoContent,

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 외부 서비스(포털, LLM, 증권사 API) 실패
    #[error("외부 서비스 에러: {0}")]
    Upstream(String),

    /// 네트워크 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 인증 에러
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 요청 한도 초과
    #[error("요청 한도 초과: {0}")]
    RateLimit(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type BriefResult<T> = Result<T, BriefError>;

impl BriefError {
    /// 호출자 입력 문제로 발생한 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BriefError::InvalidInput(_) | BriefError::NoContent | BriefError::NotFound(_)
        )
    }

    /// 외부 의존성 실패로 발생한 에러인지 확인합니다.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            BriefError::Upstream(_) | BriefError::Network(_) | BriefError::RateLimit(_)
        )
    }
}

impl From<serde_json::Error> for BriefError {
    fn from(err: serde_json::Error) -> Self {
        BriefError::Serialization(err.to_string())
    }
}
