//! 네이버 금융 수집기.
//!
//! - [`naver`]: HTTP 요청과 수집 흐름
//! - [`extract`]: 목록/본문/검색 결과 HTML 추출

pub mod extract;
pub mod naver;

pub use naver::{Crawled, NaverCrawler};
