//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! `Arc<AppState>`로 감싸 axum State extractor로 주입됩니다. 선택적 의존성
//! (데이터베이스, KIS, LLM)은 `with_*` 빌더로 붙이며, 없으면 해당 기능만
//! 비활성화됩니다.

use std::sync::Arc;

use brief_core::AppConfig;
use brief_data::{CrawlError, InMemorySummaryStore, NaverCrawler, SummaryStore};
use brief_exchange::KisChartClient;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::repository::{InMemoryUserStore, UserStore};
use crate::services::{Summarizer, SummaryService};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 로드된 설정
    pub config: Arc<AppConfig>,

    /// PostgreSQL 연결 풀 (없으면 종목 마스터 기능 비활성화)
    pub db_pool: Option<PgPool>,

    /// 요약 저장소 (기본: 메모리)
    pub summary_store: Arc<dyn SummaryStore>,

    /// 사용자 저장소 (기본: 메모리)
    pub user_store: Arc<dyn UserStore>,

    /// 네이버 금융 크롤러
    pub crawler: NaverCrawler,

    /// KIS 차트 클라이언트
    pub kis_client: Option<KisChartClient>,

    /// LLM 요약기
    pub summarizer: Option<Arc<dyn Summarizer>>,

    /// JWT 서명 키
    pub jwt_secret: String,

    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 메모리 저장소와 크롤러만 가진 상태를 만듭니다.
    pub fn new(config: AppConfig) -> Result<Self, CrawlError> {
        let crawler = NaverCrawler::new(&config.crawler)?;
        Ok(Self {
            jwt_secret: config.auth.jwt_secret.clone(),
            config: Arc::new(config),
            db_pool: None,
            summary_store: Arc::new(InMemorySummaryStore::new()),
            user_store: Arc::new(InMemoryUserStore::new()),
            crawler,
            kis_client: None,
            summarizer: None,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    pub fn with_summary_store(mut self, store: Arc<dyn SummaryStore>) -> Self {
        self.summary_store = store;
        self
    }

    pub fn with_user_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.user_store = store;
        self
    }

    pub fn with_crawler(mut self, crawler: NaverCrawler) -> Self {
        self.crawler = crawler;
        self
    }

    pub fn with_kis_client(mut self, client: KisChartClient) -> Self {
        self.kis_client = Some(client);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn has_db(&self) -> bool {
        self.db_pool.is_some()
    }

    pub fn has_kis_client(&self) -> bool {
        self.kis_client.is_some()
    }

    pub fn has_summarizer(&self) -> bool {
        self.summarizer.is_some()
    }

    /// 요약 서비스. 요약기가 설정되지 않았으면 `None`.
    pub fn summary_service(&self) -> Option<SummaryService> {
        self.summarizer.as_ref().map(|summarizer| {
            SummaryService::new(
                self.summary_store.clone(),
                summarizer.clone(),
                self.config.summarizer.top_k,
            )
        })
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// 데이터베이스 연결 상태.
    pub async fn is_db_healthy(&self) -> bool {
        match &self.db_pool {
            Some(pool) => sqlx::query("SELECT 1").fetch_one(pool).await.is_ok(),
            None => false,
        }
    }
}

/// 테스트용 상태.
///
/// 메모리 저장소를 쓰고, 크롤러는 닫힌 로컬 포트를 가리켜 실수로 외부에 요청하지
/// 않습니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    let mut config = AppConfig::default();
    config.crawler.base_url = "http://127.0.0.1:9".to_string();
    config.crawler.timeout_secs = 1;
    config.auth.jwt_secret = "test-secret-key-for-jwt-testing-minimum-32-chars".to_string();

    let crawler = NaverCrawler::with_limiter(&config.crawler, brief_data::RequestLimiter::unlimited())
        .expect("test crawler");
    AppState::new(config)
        .expect("test state")
        .with_crawler(crawler)
}
