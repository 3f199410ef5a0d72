//! 요약 저장소.
//!
//! (구분, 종목코드, 날짜) 당 하나의 행을 보관합니다. 병합 규칙은 서비스
//! 계층이 결정하고, 저장소는 조회/삽입/갱신만 담당합니다.

use std::collections::HashMap;

use async_trait::async_trait;
use brief_core::{Summary, SummaryKind};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DataError, Result};

/// 요약 저장소 인터페이스.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// 특정 날짜의 요약 조회.
    async fn get(&self, kind: SummaryKind, stock_code: &str, date: NaiveDate)
        -> Result<Option<Summary>>;

    /// 기간 내 요약 목록 (날짜 내림차순).
    async fn list_range(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Summary>>;

    /// 새 요약 저장. 같은 키가 이미 있으면 `DuplicateError`.
    async fn insert(&self, summary: &Summary) -> Result<Summary>;

    /// 기존 요약 갱신.
    ///
    /// 저장된 `updated_at`이 `expected_updated_at`과 같을 때만 반영합니다.
    /// 그 사이 다른 요청이 행을 갱신했으면 `Conflict`, 행이 없으면 `NotFound`.
    async fn update(
        &self,
        summary: &Summary,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Summary>;
}

fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(DataError::InvalidData(format!(
            "시작일({})이 종료일({})보다 늦을 수 없습니다",
            start, end
        )));
    }
    Ok(())
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// 요약 데이터베이스 레코드.
#[derive(Debug, Clone, FromRow)]
struct SummaryRecord {
    id: Uuid,
    kind: String,
    stock_code: String,
    stock_name: String,
    summary_date: NaiveDate,
    summary_content: String,
    item_count: i64,
    fingerprints: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SummaryRecord> for Summary {
    type Error = DataError;

    fn try_from(record: SummaryRecord) -> Result<Self> {
        let kind = record
            .kind
            .parse::<SummaryKind>()
            .map_err(|e| DataError::InvalidData(e.to_string()))?;

        Ok(Summary {
            id: record.id,
            kind,
            stock_code: record.stock_code,
            stock_name: record.stock_name,
            summary_date: record.summary_date,
            summary_content: record.summary_content,
            item_count: record.item_count,
            fingerprints: record.fingerprints,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

const SUMMARY_COLUMNS: &str = "id, kind, stock_code, stock_name, summary_date, summary_content, \
     item_count, fingerprints, created_at, updated_at";

/// PostgreSQL 요약 저장소.
#[derive(Clone)]
pub struct PgSummaryStore {
    pool: PgPool,
}

impl PgSummaryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryStore for PgSummaryStore {
    async fn get(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        date: NaiveDate,
    ) -> Result<Option<Summary>> {
        let sql = format!(
            "SELECT {} FROM stock_summaries WHERE kind = $1 AND stock_code = $2 AND summary_date = $3",
            SUMMARY_COLUMNS
        );
        let record = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(kind.as_str())
            .bind(stock_code)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Summary::try_from).transpose()
    }

    async fn list_range(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Summary>> {
        check_range(start, end)?;

        let sql = format!(
            r#"
            SELECT {} FROM stock_summaries
            WHERE kind = $1 AND stock_code = $2
              AND summary_date >= $3 AND summary_date <= $4
            ORDER BY summary_date DESC
            "#,
            SUMMARY_COLUMNS
        );
        let records = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(kind.as_str())
            .bind(stock_code)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        records.into_iter().map(Summary::try_from).collect()
    }

    async fn insert(&self, summary: &Summary) -> Result<Summary> {
        let sql = format!(
            r#"
            INSERT INTO stock_summaries
                (id, kind, stock_code, stock_name, summary_date, summary_content,
                 item_count, fingerprints, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SUMMARY_COLUMNS
        );
        let record = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(summary.id)
            .bind(summary.kind.as_str())
            .bind(&summary.stock_code)
            .bind(&summary.stock_name)
            .bind(summary.summary_date)
            .bind(&summary.summary_content)
            .bind(summary.item_count)
            .bind(&summary.fingerprints)
            .bind(summary.created_at)
            .bind(summary.updated_at)
            .fetch_one(&self.pool)
            .await?;

        debug!(id = %record.id, stock_code = %record.stock_code, "Summary inserted");
        Summary::try_from(record)
    }

    async fn update(
        &self,
        summary: &Summary,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Summary> {
        let sql = format!(
            r#"
            UPDATE stock_summaries SET
                stock_name = $2,
                summary_content = $3,
                item_count = $4,
                fingerprints = $5,
                updated_at = $6
            WHERE id = $1 AND updated_at = $7
            RETURNING {}
            "#,
            SUMMARY_COLUMNS
        );
        let record = sqlx::query_as::<_, SummaryRecord>(&sql)
            .bind(summary.id)
            .bind(&summary.stock_name)
            .bind(&summary.summary_content)
            .bind(summary.item_count)
            .bind(&summary.fingerprints)
            .bind(summary.updated_at)
            .bind(expected_updated_at)
            .fetch_optional(&self.pool)
            .await?;

        let Some(record) = record else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM stock_summaries WHERE id = $1)")
                    .bind(summary.id)
                    .fetch_one(&self.pool)
                    .await?;
            return Err(if exists {
                DataError::Conflict(format!("summary {}", summary.id))
            } else {
                DataError::NotFound(format!("summary {}", summary.id))
            });
        };

        debug!(id = %record.id, item_count = record.item_count, "Summary updated");
        Summary::try_from(record)
    }
}

// =============================================================================
// In-memory
// =============================================================================

type SummaryKey = (SummaryKind, String, NaiveDate);

/// 메모리 요약 저장소.
///
/// 데이터베이스가 설정되지 않았을 때와 테스트에서 사용합니다.
#[derive(Default)]
pub struct InMemorySummaryStore {
    rows: RwLock<HashMap<SummaryKey, Summary>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(summary: &Summary) -> SummaryKey {
        (summary.kind, summary.stock_code.clone(), summary.summary_date)
    }

    /// 저장된 행 수.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn get(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        date: NaiveDate,
    ) -> Result<Option<Summary>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(kind, stock_code.to_string(), date)).cloned())
    }

    async fn list_range(
        &self,
        kind: SummaryKind,
        stock_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Summary>> {
        check_range(start, end)?;

        let rows = self.rows.read().await;
        let mut found: Vec<Summary> = rows
            .values()
            .filter(|s| {
                s.kind == kind
                    && s.stock_code == stock_code
                    && s.summary_date >= start
                    && s.summary_date <= end
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.summary_date.cmp(&a.summary_date));
        Ok(found)
    }

    async fn insert(&self, summary: &Summary) -> Result<Summary> {
        let mut rows = self.rows.write().await;
        let key = Self::key(summary);
        if rows.contains_key(&key) {
            return Err(DataError::DuplicateError(format!(
                "{}/{}/{}",
                summary.kind, summary.stock_code, summary.summary_date
            )));
        }
        rows.insert(key, summary.clone());
        Ok(summary.clone())
    }

    async fn update(
        &self,
        summary: &Summary,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<Summary> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&Self::key(summary)) {
            Some(existing) if existing.id == summary.id => {
                if existing.updated_at != expected_updated_at {
                    return Err(DataError::Conflict(format!("summary {}", summary.id)));
                }
                *existing = summary.clone();
                Ok(summary.clone())
            }
            _ => Err(DataError::NotFound(format!("summary {}", summary.id))),
        }
    }
}
