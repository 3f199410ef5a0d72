//! 목록 페이지 범위.

use serde::{Deserialize, Serialize};

use crate::error::{BriefError, BriefResult};

/// 한 번에 수집할 수 있는 기본 최대 페이지 수.
pub const DEFAULT_MAX_PAGES: u32 = 20;

/// 수집할 목록 페이지 범위 (양 끝 포함).
///
/// 생성 시점에 `1 <= start <= end`가 보장됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    /// 범위를 검증하여 생성합니다.
    pub fn new(start: u32, end: u32) -> BriefResult<Self> {
        if start == 0 {
            return Err(BriefError::InvalidInput(
                "시작 페이지는 1 이상이어야 합니다".to_string(),
            ));
        }
        if start > end {
            return Err(BriefError::InvalidInput(format!(
                "시작 페이지({})가 끝 페이지({})보다 클 수 없습니다",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// 최대 페이지 수 제한을 함께 검사합니다.
    pub fn bounded(start: u32, end: u32, max_pages: u32) -> BriefResult<Self> {
        let range = Self::new(start, end)?;
        range.ensure_max_span(max_pages)?;
        Ok(range)
    }

    /// 페이지 수가 `max_pages`를 넘으면 오류.
    pub fn ensure_max_span(&self, max_pages: u32) -> BriefResult<()> {
        if self.len() > max_pages {
            return Err(BriefError::InvalidInput(format!(
                "한 번에 최대 {}페이지까지 수집할 수 있습니다 (요청: {})",
                max_pages,
                self.len()
            )));
        }
        Ok(())
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// 범위에 포함된 페이지 수.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// 생성자가 `start <= end`를 보장하므로 항상 `false`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// 페이지 번호를 오름차순으로 순회합니다.
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self { start: 1, end: 1 }
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
