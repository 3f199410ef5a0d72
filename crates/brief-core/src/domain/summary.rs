//! 저장된 요약 레코드.
//!
//! (구분, 종목코드, 날짜) 당 하나의 요약만 존재합니다. 이미 반영된 게시물은
//! URL 지문으로 추적하여 같은 게시물이 두 번 합쳐지지 않도록 합니다.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{DiscussionItem, NewsItem};
use crate::error::BriefError;

/// 요약 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SummaryKind {
    /// 뉴스 요약
    News,
    /// 종목토론 요약
    Discussion,
}

impl SummaryKind {
    /// 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryKind::News => "news",
            SummaryKind::Discussion => "discussion",
        }
    }

    /// 프롬프트에서 새 항목을 부르는 이름.
    pub fn item_label(&self) -> &'static str {
        match self {
            SummaryKind::News => "뉴스",
            SummaryKind::Discussion => "게시글",
        }
    }
}

impl std::fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SummaryKind {
    type Err = BriefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "news" => Ok(SummaryKind::News),
            "discussion" | "discussions" => Ok(SummaryKind::Discussion),
            other => Err(BriefError::InvalidInput(format!(
                "지원하지 않는 요약 구분입니다: {}",
                other
            ))),
        }
    }
}

/// 종목별 일일 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// 레코드 ID
    pub id: Uuid,
    /// 요약 구분
    pub kind: SummaryKind,
    /// 종목코드
    pub stock_code: String,
    /// 종목명
    pub stock_name: String,
    /// 요약 기준일
    pub summary_date: NaiveDate,
    /// 요약 본문
    pub summary_content: String,
    /// 지금까지 반영된 게시물 수
    pub item_count: i64,
    /// 반영된 게시물의 URL 지문
    #[serde(default)]
    pub fingerprints: Vec<String>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 수정 시각
    pub updated_at: DateTime<Utc>,
}

impl Summary {
    /// 새 요약 레코드를 생성합니다.
    pub fn new(
        kind: SummaryKind,
        stock_code: impl Into<String>,
        stock_name: impl Into<String>,
        summary_date: NaiveDate,
        summary_content: impl Into<String>,
        fingerprints: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            stock_code: stock_code.into(),
            stock_name: stock_name.into(),
            summary_date,
            summary_content: summary_content.into(),
            item_count: fingerprints.len() as i64,
            fingerprints,
            created_at: now,
            updated_at: now,
        }
    }

    /// 이미 반영된 지문인지 확인합니다.
    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.fingerprints.iter().any(|f| f == fingerprint)
    }

    /// 새 게시물을 합친 결과를 반영합니다.
    ///
    /// `item_count`는 새 지문 수만큼 증가합니다. `updated_at`은 저장소의 갱신
    /// 충돌 검사에 쓰이므로 항상 이전 값보다 최소 1µs 뒤로 이동합니다.
    pub fn apply_merge(&mut self, summary_content: String, new_fingerprints: Vec<String>) {
        self.summary_content = summary_content;
        self.item_count += new_fingerprints.len() as i64;
        self.fingerprints.extend(new_fingerprints);
        self.updated_at = Utc::now().max(self.updated_at + Duration::microseconds(1));
    }
}

/// 지문 계산 대상.
pub trait Fingerprint {
    /// 게시물 식별용 SHA-256 지문 (hex).
    ///
    /// URL이 있으면 URL로, 없으면 제목과 날짜로 계산합니다.
    fn fingerprint(&self) -> String;
}

impl Fingerprint for NewsItem {
    fn fingerprint(&self) -> String {
        content_fingerprint(&self.url, &self.title, &self.date)
    }
}

impl Fingerprint for DiscussionItem {
    fn fingerprint(&self) -> String {
        content_fingerprint(&self.url, &self.title, &self.date)
    }
}

fn content_fingerprint(url: &str, title: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    let url = url.trim();
    if url.is_empty() {
        hasher.update(title.trim().as_bytes());
        hasher.update(b"\n");
        hasher.update(date.trim().as_bytes());
    } else {
        hasher.update(url.as_bytes());
    }
    hex::encode(hasher.finalize())
}
