//! 데이터 모듈 오류 타입.

use brief_core::BriefError;
use thiserror::Error;

/// 저장소 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 중복 레코드
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 읽은 뒤 다른 요청이 먼저 갱신한 레코드
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 마이그레이션 오류
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 파일 읽기 오류
    #[error("File error: {0}")]
    FileError(String),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::DuplicateError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::FileError(err.to_string())
    }
}

impl From<DataError> for BriefError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => BriefError::NotFound(msg),
            DataError::InvalidData(msg) => BriefError::InvalidInput(msg),
            other => BriefError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

/// 포털 크롤러 에러.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP 요청 실패: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTML 파싱 실패: {0}")]
    ParseError(String),

    #[error("데이터 없음: {code}")]
    NoData { code: String },

    #[error("Rate limit 초과")]
    RateLimited,

    #[error("잘못된 요청: {0}")]
    InvalidRequest(String),

    #[error("응답 상태 코드 오류: {0}")]
    Status(u16),
}

impl CrawlError {
    /// 호출자 입력 문제인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CrawlError::InvalidRequest(_) | CrawlError::NoData { .. })
    }
}

impl From<BriefError> for CrawlError {
    fn from(err: BriefError) -> Self {
        CrawlError::InvalidRequest(err.to_string())
    }
}

impl From<CrawlError> for BriefError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::InvalidRequest(msg) => BriefError::InvalidInput(msg),
            CrawlError::NoData { code } => BriefError::NotFound(code),
            CrawlError::RateLimited => BriefError::RateLimit("포털 요청 한도 초과".to_string()),
            CrawlError::HttpError(e) => BriefError::Network(e.to_string()),
            other => BriefError::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_error_mapping() {
        let err: BriefError = CrawlError::InvalidRequest("page".to_string()).into();
        assert!(matches!(err, BriefError::InvalidInput(_)));

        let err: BriefError = CrawlError::RateLimited.into();
        assert!(err.is_upstream());

        let err: BriefError = CrawlError::Status(503).into();
        assert!(matches!(err, BriefError::Upstream(_)));
    }

    #[test]
    fn test_data_error_mapping() {
        let err: BriefError = DataError::NotFound("summary".to_string()).into();
        assert!(matches!(err, BriefError::NotFound(_)));

        let err: BriefError = DataError::PoolExhausted.into();
        assert!(matches!(err, BriefError::Database(_)));

        let err: BriefError = DataError::Conflict("summary".to_string()).into();
        assert!(matches!(err, BriefError::Database(_)));
    }
}
