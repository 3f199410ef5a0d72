//! 저장소 계층.
//!
//! - [`database`]: PostgreSQL 연결 풀과 마이그레이션
//! - [`stock_master`]: 종목 마스터 테이블
//! - [`summary`]: 요약 저장소 (PostgreSQL / 메모리)

pub mod database;
pub mod stock_master;
pub mod summary;

pub use database::Database;
pub use stock_master::{StockMasterRecord, StockMasterRepository};
pub use summary::{InMemorySummaryStore, PgSummaryStore, SummaryStore};
