//! 종목 마스터 저장소.
//!
//! 종목코드-종목명 매핑 및 검색 기능을 제공합니다.

use brief_core::StockInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;

use crate::error::Result;

/// 기본 검색 결과 수.
pub const DEFAULT_SEARCH_LIMIT: i64 = 10;

/// 한 번의 UNNEST 쿼리로 저장할 최대 행 수.
const UPSERT_CHUNK_SIZE: usize = 1000;

/// 종목 마스터 레코드.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMasterRecord {
    pub code: String,
    pub name: String,
    pub market: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<StockMasterRecord> for StockInfo {
    fn from(record: StockMasterRecord) -> Self {
        StockInfo::new(record.code, record.name, record.market)
    }
}

/// LIKE 패턴의 특수문자를 이스케이프합니다.
///
/// 검색어는 항상 문자 그대로 비교됩니다.
pub fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// 종목 마스터 저장소.
pub struct StockMasterRepository;

impl StockMasterRepository {
    /// 종목 검색 (종목코드 + 종목명).
    ///
    /// 종목코드가 정확히 일치하는 결과가 먼저 옵니다.
    pub async fn search(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<StockInfo>> {
        let query = query.trim();
        let pattern = format!("%{}%", escape_like(query));

        let records = sqlx::query_as::<_, StockMasterRecord>(
            r#"
            SELECT code, name, market, created_at, updated_at
            FROM stock_master
            WHERE code ILIKE $1 OR name ILIKE $1
            ORDER BY
                CASE WHEN code = $2 THEN 0
                     WHEN name = $2 THEN 1
                     ELSE 2
                END,
                code
            LIMIT $3
            "#,
        )
        .bind(&pattern)
        .bind(query)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(records.into_iter().map(StockInfo::from).collect())
    }

    /// 종목코드로 조회.
    pub async fn get_by_code(pool: &PgPool, code: &str) -> Result<Option<StockInfo>> {
        let record = sqlx::query_as::<_, StockMasterRecord>(
            "SELECT code, name, market, created_at, updated_at FROM stock_master WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(pool)
        .await?;

        Ok(record.map(StockInfo::from))
    }

    /// 종목 일괄 저장 (UNNEST 최적화).
    ///
    /// 종목코드가 이미 있으면 종목명과 시장을 갱신합니다. 입력에 같은 코드가
    /// 두 번 있으면 안 됩니다 ([`crate::master_file::dedupe_by_code`] 참고).
    ///
    /// # Returns
    /// 저장된 레코드 수
    pub async fn upsert_batch(pool: &PgPool, items: &[StockInfo]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut affected = 0u64;

        for chunk in items.chunks(UPSERT_CHUNK_SIZE) {
            let codes: Vec<&str> = chunk.iter().map(|s| s.code.as_str()).collect();
            let names: Vec<&str> = chunk.iter().map(|s| s.name.as_str()).collect();
            let markets: Vec<&str> = chunk.iter().map(|s| s.market.as_str()).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO stock_master (code, name, market)
                SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
                ON CONFLICT (code) DO UPDATE SET
                    name = EXCLUDED.name,
                    market = EXCLUDED.market,
                    updated_at = NOW()
                "#,
            )
            .bind(&codes)
            .bind(&names)
            .bind(&markets)
            .execute(&mut *tx)
            .await?;

            affected += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            "Upserted {} stock master rows (affected: {})",
            items.len(),
            affected
        );
        Ok(affected as usize)
    }

    /// 전체 종목 수.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stock_master")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("삼성"), "삼성");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\"), "c:\\\\");
    }

    #[test]
    fn test_record_into_stock_info() {
        let record = StockMasterRecord {
            code: "005930".to_string(),
            name: "삼성전자".to_string(),
            market: "KOSPI".to_string(),
            created_at: None,
            updated_at: None,
        };
        let info: StockInfo = record.into();
        assert_eq!(info, StockInfo::new("005930", "삼성전자", "KOSPI"));
    }
}
