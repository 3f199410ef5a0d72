//! 네이버 금융 크롤러.
//!
//! 종목 뉴스와 종목토론방 게시글을 수집합니다.
//!
//! ## 데이터 소스
//! - `/item/main.naver`: 세션 수립, 종목명
//! - `/item/news_news.naver`: 종목 뉴스 목록
//! - `/item/board.naver`: 종목토론방 목록 (EUC-KR)
//! - `/search/searchList.naver`: 종목 검색
//!
//! ## 사용 예시
//! ```rust,ignore
//! let crawler = NaverCrawler::new(&CrawlerConfig::default())?;
//! let crawled = crawler.fetch_news("005930", PageRange::new(1, 2)?).await?;
//! println!("{}건 수집", crawled.items.len());
//! ```

use std::time::Duration;

use brief_core::{
    is_valid_stock_code, CrawlerConfig, DiscussionItem, NewsItem, PageRange, StockInfo,
    CONTENT_UNAVAILABLE,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};

use super::extract;
use crate::error::CrawlError;
use crate::limiter::{LimiterConfig, RequestLimiter};

const REFERER_URL: &str = "https://finance.naver.com/";
const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";
const ACCEPT_KO: &str = "ko-KR,ko;q=0.9,en-US;q=0.8,en;q=0.7";

/// 포털 페이지의 기본 문자셋. 응답 헤더에 charset이 있으면 그것을 따릅니다.
const DEFAULT_CHARSET: &str = "euc-kr";

/// 크롤링 결과.
#[derive(Debug, Clone)]
pub struct Crawled<T> {
    /// 수집된 게시물 (목록 순서)
    pub items: Vec<T>,
    /// 메인 페이지에서 읽은 종목명
    pub stock_name: Option<String>,
}

/// 네이버 금융 크롤러.
///
/// 한 요청 안에서는 페이지 순서대로, 그다음 게시물 순서대로 순차 수집합니다.
/// 모든 외부 요청은 공유 [`RequestLimiter`]를 거칩니다.
#[derive(Debug, Clone)]
pub struct NaverCrawler {
    client: Client,
    base_url: String,
    limiter: RequestLimiter,
    max_pages: u32,
}

impl NaverCrawler {
    /// 설정으로 크롤러 생성.
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        Self::with_limiter(config, RequestLimiter::new(LimiterConfig::from(config)))
    }

    /// 외부에서 만든 제한기를 공유하는 크롤러 생성.
    pub fn with_limiter(config: &CrawlerConfig, limiter: RequestLimiter) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static(REFERER_URL));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_KO));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            limiter,
            max_pages: config.max_pages,
        })
    }

    /// 포털 기본 URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 요청 전 입력을 검증합니다. 네트워크 호출 전에 실패해야 합니다.
    fn validate(&self, code: &str, range: &PageRange) -> Result<(), CrawlError> {
        if !is_valid_stock_code(code) {
            return Err(CrawlError::InvalidRequest(format!(
                "종목코드는 6자리 숫자여야 합니다: {}",
                code
            )));
        }
        range.ensure_max_span(self.max_pages)?;
        Ok(())
    }

    /// 페이지 HTML을 가져옵니다.
    async fn get_html(&self, url: &str) -> Result<String, CrawlError> {
        self.limiter.acquire().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlError::RateLimited);
        }
        if !status.is_success() {
            return Err(CrawlError::Status(status.as_u16()));
        }

        Ok(response.text_with_charset(DEFAULT_CHARSET).await?)
    }

    /// 종목 메인 페이지를 방문하고 종목명을 반환합니다.
    ///
    /// 실패해도 수집은 계속됩니다.
    async fn visit_main_page(&self, code: &str) -> Option<String> {
        let url = format!("{}/item/main.naver?code={}", self.base_url, code);
        match self.get_html(&url).await {
            Ok(html) => extract::parse_stock_name(&html),
            Err(e) => {
                warn!(stock_code = code, error = %e, "Main page visit failed");
                None
            }
        }
    }

    /// 종목명 조회.
    pub async fn fetch_stock_name(&self, code: &str) -> Result<Option<String>, CrawlError> {
        if !is_valid_stock_code(code) {
            return Err(CrawlError::InvalidRequest(format!(
                "종목코드는 6자리 숫자여야 합니다: {}",
                code
            )));
        }
        let url = format!("{}/item/main.naver?code={}", self.base_url, code);
        let html = self.get_html(&url).await?;
        Ok(extract::parse_stock_name(&html))
    }

    /// 종목 뉴스 수집.
    ///
    /// 목록 페이지 실패는 전체 실패이고, 본문 실패는 대체 문구로 채웁니다.
    #[instrument(skip(self, range), fields(range = %range))]
    pub async fn fetch_news(
        &self,
        code: &str,
        range: PageRange,
    ) -> Result<Crawled<NewsItem>, CrawlError> {
        self.validate(code, &range)?;

        let stock_name = self.visit_main_page(code).await;
        let mut items = Vec::new();

        for page in range.pages() {
            let url = format!(
                "{}/item/news_news.naver?code={}&page={}",
                self.base_url, code, page
            );
            let html = self.get_html(&url).await?;
            let page_items = extract::parse_news_list(&html, &self.base_url);
            debug!(stock_code = code, page, count = page_items.len(), "News list page parsed");
            items.extend(page_items);
        }

        for item in items.iter_mut() {
            item.content = self.fetch_body(&item.url, extract::extract_news_body).await;
        }

        info!(stock_code = code, count = items.len(), "News crawl completed");
        Ok(Crawled { items, stock_name })
    }

    /// 종목토론방 게시글 수집.
    #[instrument(skip(self, range), fields(range = %range))]
    pub async fn fetch_discussions(
        &self,
        code: &str,
        range: PageRange,
    ) -> Result<Crawled<DiscussionItem>, CrawlError> {
        self.validate(code, &range)?;

        let stock_name = self.visit_main_page(code).await;
        let mut items = Vec::new();

        for page in range.pages() {
            let url = format!(
                "{}/item/board.naver?code={}&page={}",
                self.base_url, code, page
            );
            let html = self.get_html(&url).await?;
            let page_items = extract::parse_discussion_list(&html, &self.base_url);
            debug!(stock_code = code, page, count = page_items.len(), "Board list page parsed");
            items.extend(page_items);
        }

        for item in items.iter_mut() {
            item.content = self
                .fetch_body(&item.url, extract::extract_discussion_body)
                .await;
        }

        info!(stock_code = code, count = items.len(), "Discussion crawl completed");
        Ok(Crawled { items, stock_name })
    }

    /// 상세 페이지 본문을 가져옵니다. 실패하면 대체 문구를 반환합니다.
    async fn fetch_body(&self, url: &str, extractor: fn(&str) -> Option<String>) -> String {
        match self.get_html(url).await {
            Ok(html) => extractor(&html).unwrap_or_else(|| {
                debug!(url, "Body selector not matched");
                CONTENT_UNAVAILABLE.to_string()
            }),
            Err(e) => {
                warn!(url, error = %e, "Body fetch failed");
                CONTENT_UNAVAILABLE.to_string()
            }
        }
    }

    /// 포털 종목 검색.
    #[instrument(skip(self))]
    pub async fn search_stocks(&self, keyword: &str) -> Result<Vec<StockInfo>, CrawlError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(CrawlError::InvalidRequest("검색어를 입력해주세요.".to_string()));
        }

        self.limiter.acquire().await;
        let url = format!("{}/search/searchList.naver", self.base_url);
        let response = self.client.get(&url).query(&[("query", keyword)]).send().await?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CrawlError::RateLimited);
        }
        if !status.is_success() {
            return Err(CrawlError::Status(status.as_u16()));
        }

        let html = response.text_with_charset(DEFAULT_CHARSET).await?;
        Ok(extract::parse_search_results(&html))
    }
}
