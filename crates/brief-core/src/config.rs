//! 설정 관리.
//!
//! 설정은 다음 순서로 덮어씁니다:
//! 1. 코드 기본값
//! 2. TOML 설정 파일 (`config/default.toml`)
//! 3. `BRIEF__SECTION__KEY` 형식의 환경 변수
//! 4. 널리 쓰이는 단일 환경 변수 (`DATABASE_URL`, `OPENAI_API_KEY` 등)

use serde::{Deserialize, Serialize};
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 포털 크롤러 설정
    pub crawler: CrawlerConfig,
    /// LLM 요약 설정
    pub summarizer: SummarizerConfig,
    /// 한국투자증권 API 설정
    pub kis: KisSettings,
    /// 인증 설정
    pub auth: AuthConfig,
    /// API 요청 제한 설정
    pub rate_limit: RateLimitSettings,
    /// CORS 설정
    pub cors: CorsConfig,
    /// 종목 마스터 파일 설정
    pub master_file: MasterFileConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 전역 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    /// `host:port` 형식의 바인딩 주소.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL (없으면 메모리 저장소 사용)
    pub url: Option<String>,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 획득 타임아웃 (초)
    pub acquire_timeout_secs: u64,
    /// 시작 시 마이그레이션 실행 여부
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 10,
            run_migrations: true,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨 필터
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// span 진입/종료 이벤트 기록 여부
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::DEFAULT_LOG_FILTER.to_string(),
            format: "pretty".to_string(),
            span_events: false,
        }
    }
}

/// 포털 크롤러 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// 네이버 금융 기본 URL
    pub base_url: String,
    /// 초당 허용 요청 수
    pub requests_per_second: f64,
    /// 버스트 허용량
    pub burst: u32,
    /// 한 번에 크롤링할 수 있는 최대 페이지 수
    pub max_pages: u32,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// User-Agent 헤더
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://finance.naver.com".to_string(),
            requests_per_second: 2.0,
            burst: 1,
            max_pages: crate::domain::DEFAULT_MAX_PAGES,
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// LLM 요약 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Chat Completions API 기본 URL
    pub base_url: String,
    /// API 키 (없으면 요약 기능 비활성화)
    pub api_key: Option<String>,
    /// 모델 이름
    pub model: String,
    /// 샘플링 온도
    pub temperature: f32,
    /// 최대 생성 토큰 수
    pub max_tokens: u32,
    /// 종목토론 요약 시 사용할 상위 게시글 수
    pub top_k: usize,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            top_k: crate::domain::DEFAULT_TOP_K,
            timeout_secs: 90,
        }
    }
}

/// 한국투자증권 API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KisSettings {
    /// 앱키
    pub app_key: Option<String>,
    /// 앱시크릿
    pub app_secret: Option<String>,
    /// 환경 ("real" | "paper")
    pub environment: String,
    /// 기본 URL 재정의 (테스트/프록시용)
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for KisSettings {
    fn default() -> Self {
        Self {
            app_key: None,
            app_secret: None,
            environment: "real".to_string(),
            base_url: None,
            timeout_secs: 30,
        }
    }
}

/// 인증 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT 서명 키
    pub jwt_secret: String,
    /// Access Token 만료 시간 (분)
    pub access_token_minutes: i64,
    /// Refresh Token 만료 시간 (일)
    pub refresh_token_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "development-secret-key-change-in-production".to_string(),
            access_token_minutes: 60,
            refresh_token_days: 7,
        }
    }
}

/// API 요청 제한 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// IP당 분당 최대 요청 수
    pub requests_per_minute: u32,
    /// 요청 제한 비활성화
    pub disabled: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 600,
            disabled: false,
        }
    }
}

/// CORS 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// 허용 origin 목록 (비어 있으면 모든 origin 허용)
    pub origins: Vec<String>,
}

/// 종목 마스터 파일 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MasterFileConfig {
    /// KOSPI 종목 마스터 파일 경로 (CP949)
    pub kospi_path: String,
}

impl Default for MasterFileConfig {
    fn default() -> Self {
        Self {
            kospi_path: "data/kospi_code.txt".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()).required(false))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("BRIEF")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 널리 쓰이는 단일 환경 변수를 반영합니다.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("API_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.summarizer.api_key = Some(key);
        }
        if let Some(key) = non_empty("KIS_APP_KEY") {
            self.kis.app_key = Some(key);
        }
        if let Some(secret) = non_empty("KIS_APP_SECRET") {
            self.kis.app_secret = Some(secret);
        }
        if let Some(secret) = non_empty("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(origins) = non_empty("CORS_ORIGINS") {
            self.cors.origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(rpm) = non_empty("RATE_LIMIT_RPM").and_then(|v| v.parse().ok()) {
            self.rate_limit.requests_per_minute = rpm;
        }
        if let Some(disabled) = non_empty("RATE_LIMIT_DISABLED") {
            self.rate_limit.disabled = disabled == "true" || disabled == "1";
        }
    }

    /// 값의 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.crawler.requests_per_second <= 0.0 {
            return Err(config::ConfigError::Message(
                "crawler.requests_per_second는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.crawler.max_pages == 0 {
            return Err(config::ConfigError::Message(
                "crawler.max_pages는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.summarizer.top_k == 0 {
            return Err(config::ConfigError::Message(
                "summarizer.top_k는 1 이상이어야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.crawler.base_url, "https://finance.naver.com");
        assert_eq!(config.summarizer.model, "gpt-4-turbo-preview");
        assert_eq!(config.summarizer.top_k, 10);
        assert!(config.database.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("API_PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/brief"),
            ("OPENAI_API_KEY", "sk-test"),
            ("CORS_ORIGINS", "https://a.example.com, https://b.example.com"),
            ("RATE_LIMIT_DISABLED", "true"),
            ("KIS_APP_KEY", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://localhost/brief")
        );
        assert_eq!(config.summarizer.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.cors.origins.len(), 2);
        assert!(config.rate_limit.disabled);
        // 빈 값은 무시
        assert!(config.kis.app_key.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut config = AppConfig::default();
        config.crawler.requests_per_second = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.crawler.max_pages, 20);
    }
}
