//! 네이버 금융 HTML 추출기.
//!
//! 모든 함수는 동기 함수이며 소유한 값만 반환합니다. `scraper::Html`은
//! `Send`가 아니므로 await 지점을 넘겨 보관하지 않습니다.

use brief_core::{DiscussionItem, NewsItem, StockInfo};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// 뉴스 본문 셀렉터 (우선순위 순).
pub const NEWS_BODY_SELECTORS: &[&str] = &[
    "#newsEndContents",
    ".article_body",
    ".article_view",
    "#articleBodyContents",
    ".news_end",
    ".newsViewArea",
    ".article_body_contents",
    "#articleBody",
    ".article-body",
    ".news_body_area",
];

/// 뉴스 본문을 찾지 못했을 때 시도하는 일반 영역 셀렉터.
pub const NEWS_FALLBACK_SELECTORS: &[&str] = &["article", ".article", ".news", ".content"];

/// 토론 게시글 본문 셀렉터 (우선순위 순).
pub const DISCUSSION_BODY_SELECTORS: &[&str] =
    &["#body", ".view_content", ".post_content", ".post-view"];

/// 셀렉터 컴파일. 실패하면 경고를 남기고 `None`.
fn compile(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(css, error = %e, "Invalid selector");
            None
        }
    }
}

/// 우선순위 목록 컴파일. 잘못된 항목은 빠지므로 길이로 검사합니다.
fn compile_all(list: &[&str]) -> Vec<Selector> {
    list.iter().filter_map(|css| compile(css)).collect()
}

struct NewsListSelectors {
    row: Selector,
    header: Selector,
    link: Selector,
    date: Selector,
    info: Selector,
}

struct DiscussionListSelectors {
    row: Selector,
    header: Selector,
    spacer: Selector,
    cell: Selector,
    link: Selector,
    author: Selector,
}

struct SearchSelectors {
    row: Selector,
    title: Selector,
    market: Selector,
}

static STOCK_NAME: Lazy<Option<Selector>> = Lazy::new(|| compile("div.wrap_company h2 a"));

static NEWS_LIST: Lazy<Option<NewsListSelectors>> = Lazy::new(|| {
    Some(NewsListSelectors {
        row: compile("table.type5 tr")?,
        header: compile("th")?,
        link: compile("td.title a")?,
        date: compile("td.date")?,
        info: compile("td.info")?,
    })
});

static DISCUSSION_LIST: Lazy<Option<DiscussionListSelectors>> = Lazy::new(|| {
    Some(DiscussionListSelectors {
        row: compile("table.type2 tr")?,
        header: compile("th")?,
        spacer: compile("td[colspan]")?,
        cell: compile("td")?,
        link: compile("td.title a")?,
        author: compile("td.p11")?,
    })
});

static SEARCH_RESULTS: Lazy<Option<SearchSelectors>> = Lazy::new(|| {
    Some(SearchSelectors {
        row: compile(".tbl_search tbody tr")?,
        title: compile(".tit")?,
        market: compile(".market")?,
    })
});

static NEWS_BODY: Lazy<Vec<Selector>> = Lazy::new(|| {
    let mut selectors = compile_all(NEWS_BODY_SELECTORS);
    selectors.extend(compile_all(NEWS_FALLBACK_SELECTORS));
    selectors
});

static DISCUSSION_BODY: Lazy<Vec<Selector>> =
    Lazy::new(|| compile_all(DISCUSSION_BODY_SELECTORS));

/// 요소의 텍스트를 공백 정리 후 반환합니다.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// 상대 경로를 포털 기본 URL 기준 절대 URL로 변환합니다.
pub fn resolve_url(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", base, href)
    } else {
        format!("{}/{}", base, href)
    }
}

/// "1,234" 형식의 카운트를 파싱합니다. 숫자가 없으면 0.
pub fn parse_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// 종목 메인 페이지에서 종목명을 추출합니다.
pub fn parse_stock_name(html: &str) -> Option<String> {
    let sel = STOCK_NAME.as_ref()?;
    let document = Html::parse_document(html);
    document
        .select(sel)
        .next()
        .map(element_text)
        .filter(|name| !name.is_empty())
}

/// 뉴스 목록 페이지를 파싱합니다.
///
/// 헤더 행과 제목/링크가 없는 행은 건너뜁니다.
pub fn parse_news_list(html: &str, base_url: &str) -> Vec<NewsItem> {
    let Some(sel) = NEWS_LIST.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut items = Vec::new();
    for row in document.select(&sel.row) {
        if row.select(&sel.header).next().is_some() {
            continue;
        }
        let Some(link) = row.select(&sel.link).next() else {
            continue;
        };
        let title = element_text(link);
        let href = link.value().attr("href").unwrap_or_default().trim();
        if title.is_empty() || href.is_empty() {
            continue;
        }

        items.push(NewsItem {
            title,
            content: String::new(),
            url: resolve_url(base_url, href),
            date: row.select(&sel.date).next().map(element_text).unwrap_or_default(),
            source: row.select(&sel.info).next().map(element_text).unwrap_or_default(),
        });
    }
    items
}

/// 종목토론 목록 페이지를 파싱합니다.
///
/// 셀 순서: 날짜, 제목, 작성자, 조회, 공감, 비공감.
pub fn parse_discussion_list(html: &str, base_url: &str) -> Vec<DiscussionItem> {
    let Some(sel) = DISCUSSION_LIST.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut items = Vec::new();
    for row in document.select(&sel.row) {
        if row.select(&sel.header).next().is_some() || row.select(&sel.spacer).next().is_some() {
            continue;
        }
        let Some(link) = row.select(&sel.link).next() else {
            continue;
        };
        let title = element_text(link);
        let href = link.value().attr("href").unwrap_or_default().trim();
        if title.is_empty() || href.is_empty() {
            continue;
        }

        let cells: Vec<ElementRef<'_>> = row.select(&sel.cell).collect();
        let cell_text = |idx: usize| cells.get(idx).map(|c| element_text(*c)).unwrap_or_default();

        items.push(DiscussionItem {
            title,
            content: String::new(),
            url: resolve_url(base_url, href),
            date: cell_text(0),
            author: row.select(&sel.author).next().map(element_text).unwrap_or_default(),
            views: parse_count(&cell_text(3)),
            likes: parse_count(&cell_text(4)),
        });
    }
    items
}

/// 컴파일된 셀렉터를 순서대로 시도해 처음으로 비어 있지 않은 텍스트를 반환합니다.
pub fn extract_body(html: &str, selectors: &[Selector]) -> Option<String> {
    let document = Html::parse_document(html);

    selectors.iter().find_map(|sel| {
        document
            .select(sel)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// 뉴스 기사 본문 추출. 전용 셀렉터 다음에 일반 영역 셀렉터를 시도합니다.
pub fn extract_news_body(html: &str) -> Option<String> {
    extract_body(html, &NEWS_BODY)
}

/// 토론 게시글 본문 추출.
pub fn extract_discussion_body(html: &str) -> Option<String> {
    extract_body(html, &DISCUSSION_BODY)
}

/// 종목 검색 결과 페이지를 파싱합니다.
pub fn parse_search_results(html: &str) -> Vec<StockInfo> {
    let Some(sel) = SEARCH_RESULTS.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&sel.row)
        .filter_map(|row| {
            let tit = row.select(&sel.title).next()?;
            let name = element_text(tit);
            let code = tit.value().attr("href").and_then(code_from_href)?;
            if name.is_empty() {
                return None;
            }
            let market = row.select(&sel.market).next().map(element_text).unwrap_or_default();
            Some(StockInfo::new(code, name, market))
        })
        .collect()
}

/// `...?code=005930&...` 형식의 링크에서 종목코드를 꺼냅니다.
fn code_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("code=")?;
    let code = rest.split('&').next().unwrap_or_default().trim();
    (!code.is_empty()).then(|| code.to_string())
}
