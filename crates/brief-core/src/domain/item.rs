//! 크롤링으로 수집되는 게시물 모델.
//!
//! 수집기가 생성한 뒤에는 변경되지 않습니다.

use serde::{Deserialize, Serialize};

/// 본문을 가져오지 못했을 때 사용하는 대체 문구.
pub const CONTENT_UNAVAILABLE: &str = "내용을 가져올 수 없습니다.";

/// 종목 뉴스 기사.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct NewsItem {
    /// 기사 제목
    pub title: String,
    /// 기사 본문
    #[serde(default)]
    pub content: String,
    /// 기사 URL
    #[serde(default)]
    pub url: String,
    /// 게시 일시 (포털 표기 그대로)
    #[serde(default)]
    pub date: String,
    /// 언론사
    #[serde(default)]
    pub source: String,
}

/// 종목토론방 게시글.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct DiscussionItem {
    /// 게시글 제목
    pub title: String,
    /// 게시글 본문
    #[serde(default)]
    pub content: String,
    /// 게시글 URL
    #[serde(default)]
    pub url: String,
    /// 작성 일시
    #[serde(default)]
    pub date: String,
    /// 작성자
    #[serde(default)]
    pub author: String,
    /// 조회수
    #[serde(default)]
    pub views: u64,
    /// 좋아요 수
    #[serde(default)]
    pub likes: u64,
}

/// 수집 대상 구분 없이 다루기 위한 게시물.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// 뉴스 기사
    News(NewsItem),
    /// 종목토론 게시글
    Discussion(DiscussionItem),
}

impl ContentItem {
    /// 제목.
    pub fn title(&self) -> &str {
        match self {
            ContentItem::News(item) => &item.title,
            ContentItem::Discussion(item) => &item.title,
        }
    }

    /// 본문.
    pub fn body(&self) -> &str {
        match self {
            ContentItem::News(item) => &item.content,
            ContentItem::Discussion(item) => &item.content,
        }
    }

    /// 원문 URL.
    pub fn url(&self) -> &str {
        match self {
            ContentItem::News(item) => &item.url,
            ContentItem::Discussion(item) => &item.url,
        }
    }

    /// 언론사 또는 작성자.
    pub fn source_or_author(&self) -> &str {
        match self {
            ContentItem::News(item) => &item.source,
            ContentItem::Discussion(item) => &item.author,
        }
    }
}

impl From<NewsItem> for ContentItem {
    fn from(item: NewsItem) -> Self {
        ContentItem::News(item)
    }
}

impl From<DiscussionItem> for ContentItem {
    fn from(item: DiscussionItem) -> Self {
        ContentItem::Discussion(item)
    }
}

/// 종목 기본 정보.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct StockInfo {
    /// 종목코드 (6자리)
    pub code: String,
    /// 종목명
    pub name: String,
    /// 시장 구분 (KOSPI, KOSDAQ 등)
    pub market: String,
}

impl StockInfo {
    /// 새 종목 정보 생성.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        market: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            market: market.into(),
        }
    }
}

/// 6자리 숫자 종목코드인지 확인합니다.
pub fn is_valid_stock_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_item_accessors() {
        let item: ContentItem = DiscussionItem {
            title: "삼성전자 간다".to_string(),
            content: "본문".to_string(),
            url: "https://finance.naver.com/item/board_read.naver?nid=1".to_string(),
            date: "2024.03.01 10:00".to_string(),
            author: "개미".to_string(),
            views: 10,
            likes: 1,
        }
        .into();

        assert_eq!(item.title(), "삼성전자 간다");
        assert_eq!(item.body(), "본문");
        assert_eq!(item.source_or_author(), "개미");
    }

    #[test]
    fn test_discussion_defaults_on_missing_fields() {
        let item: DiscussionItem = serde_json::from_str(r#"{"title":"제목"}"#).unwrap();
        assert_eq!(item.views, 0);
        assert_eq!(item.likes, 0);
        assert!(item.content.is_empty());
    }

    #[test]
    fn test_stock_code_validation() {
        assert!(is_valid_stock_code("005930"));
        assert!(!is_valid_stock_code("5930"));
        assert!(!is_valid_stock_code("00593A"));
        assert!(!is_valid_stock_code(""));
    }
}
