//! 게시물 관련도 점수.
//!
//! 점수는 상대적인 순위를 매기는 데에만 쓰이며 항상 0 이상입니다.
//!
//! | 항목 | 점수 |
//! |------|------|
//! | 제목에 종목명 포함 | +3 |
//! | 본문 내 종목명 등장 횟수 | +min(횟수, 5) |
//! | 조회수 (토론 게시글) | +min(조회수 / 100, 5) |
//! | 좋아요 (토론 게시글) | +min(좋아요, 5) |

use std::cmp::Ordering;

use serde::Serialize;

use super::{ContentItem, DiscussionItem, NewsItem};

/// 요약에 사용할 기본 상위 게시물 수.
pub const DEFAULT_TOP_K: usize = 10;

const TITLE_BONUS: f64 = 3.0;
const BODY_MATCH_CAP: usize = 5;
const VIEWS_DIVISOR: f64 = 100.0;
const VIEWS_CAP: f64 = 5.0;
const LIKES_CAP: u64 = 5;

/// 관련도 점수를 매길 수 있는 게시물.
pub trait Scorable {
    /// 제목.
    fn title(&self) -> &str;

    /// 본문.
    fn body(&self) -> &str;

    /// 조회수와 좋아요 수. 인기도 정보가 없는 게시물은 `None`.
    fn popularity(&self) -> Option<(u64, u64)> {
        None
    }
}

impl Scorable for NewsItem {
    fn title(&self) -> &str {
        &self.title
    }

    fn body(&self) -> &str {
        &self.content
    }
}

impl Scorable for DiscussionItem {
    fn title(&self) -> &str {
        &self.title
    }

    fn body(&self) -> &str {
        &self.content
    }

    fn popularity(&self) -> Option<(u64, u64)> {
        Some((self.views, self.likes))
    }
}

impl Scorable for ContentItem {
    fn title(&self) -> &str {
        ContentItem::title(self)
    }

    fn body(&self) -> &str {
        ContentItem::body(self)
    }

    fn popularity(&self) -> Option<(u64, u64)> {
        match self {
            ContentItem::News(_) => None,
            ContentItem::Discussion(item) => item.popularity(),
        }
    }
}

/// 점수가 매겨진 게시물.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem<T> {
    /// 원본 게시물
    #[serde(flatten)]
    pub item: T,
    /// 관련도 점수
    pub relevance_score: f64,
}

/// 게시물의 관련도 점수를 계산합니다.
///
/// 종목명 비교는 대소문자를 구분하지 않습니다. 종목명이 비어 있거나
/// 공백뿐이면 제목/본문 점수는 0입니다.
pub fn relevance_score<T: Scorable + ?Sized>(item: &T, stock_name: &str) -> f64 {
    let needle = stock_name.trim().to_lowercase();
    let mut score = 0.0;

    if !needle.is_empty() {
        if item.title().to_lowercase().contains(&needle) {
            score += TITLE_BONUS;
        }

        let body_matches = item.body().to_lowercase().matches(needle.as_str()).count();
        score += body_matches.min(BODY_MATCH_CAP) as f64;
    }

    if let Some((views, likes)) = item.popularity() {
        score += (views as f64 / VIEWS_DIVISOR).min(VIEWS_CAP);
        score += likes.min(LIKES_CAP) as f64;
    }

    score
}

/// 점수 내림차순으로 정렬해 상위 `k`개를 반환합니다.
///
/// 동점인 게시물은 입력 순서를 유지합니다.
pub fn select_top<T: Scorable>(items: Vec<T>, stock_name: &str, k: usize) -> Vec<ScoredItem<T>> {
    let mut scored: Vec<ScoredItem<T>> = items
        .into_iter()
        .map(|item| {
            let relevance_score = relevance_score(&item, stock_name);
            ScoredItem {
                item,
                relevance_score,
            }
        })
        .collect();

    // sort_by는 안정 정렬
    scored.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    scored.truncate(k);
    scored
}
