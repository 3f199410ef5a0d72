//! 데이터 수집 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 네이버 금융 뉴스/종목토론 크롤러
//! - 외부 요청 속도 제한기 (Token Bucket)
//! - KOSPI 종목 마스터 파일 파서
//! - PostgreSQL 저장소 (종목 마스터, 요약)
//! - 메모리 요약 저장소

pub mod crawler;
pub mod error;
pub mod limiter;
pub mod master_file;
pub mod storage;

pub use error::{CrawlError, DataError, Result};

// 크롤러 재내보내기
pub use crawler::{Crawled, NaverCrawler};
pub use limiter::{LimiterConfig, RequestLimiter};

// 저장소 타입 재내보내기
pub use storage::{
    Database, InMemorySummaryStore, PgSummaryStore, StockMasterRecord, StockMasterRepository,
    SummaryStore,
};
