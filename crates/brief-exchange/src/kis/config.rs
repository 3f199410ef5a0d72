//! 한국투자증권 (KIS) API 설정.
//!
//! 시세 조회만 사용하므로 계좌번호 없이 app_key/app_secret만 필요합니다.

use std::fmt;
use std::str::FromStr;

use brief_core::KisSettings;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// KIS API 환경 유형.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KisEnvironment {
    /// 실전투자
    #[default]
    Real,
    /// 모의투자
    Paper,
}

impl KisEnvironment {
    /// 이 환경의 REST API 기본 URL 반환.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            KisEnvironment::Real => "https://openapi.koreainvestment.com:9443",
            KisEnvironment::Paper => "https://openapivts.koreainvestment.com:29443",
        }
    }
}

impl FromStr for KisEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "real" | "prod" => Ok(KisEnvironment::Real),
            "paper" | "mock" | "test" => Ok(KisEnvironment::Paper),
            other => Err(format!("알 수 없는 KIS 환경: {}", other)),
        }
    }
}

/// KIS 클라이언트 설정.
#[derive(Clone)]
pub struct KisConfig {
    /// 앱키
    pub app_key: String,
    /// 앱시크릿
    pub app_secret: SecretString,
    /// API 환경
    pub environment: KisEnvironment,
    /// 기본 URL 재정의 (테스트/프록시용)
    pub base_url: Option<String>,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl KisConfig {
    /// 실전투자 환경의 설정 생성.
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: SecretString::from(app_secret.into()),
            environment: KisEnvironment::Real,
            base_url: None,
            timeout_secs: 30,
        }
    }

    /// 환경 지정.
    pub fn with_environment(mut self, environment: KisEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// 기본 URL 재정의.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// 애플리케이션 설정에서 생성. 키가 없으면 `None`.
    pub fn from_settings(settings: &KisSettings) -> Option<Self> {
        let app_key = settings.app_key.as_deref().filter(|k| !k.trim().is_empty())?;
        let app_secret = settings.app_secret.as_deref().filter(|s| !s.trim().is_empty())?;

        let environment = settings.environment.parse().unwrap_or_else(|e| {
            tracing::warn!("{}, 실전투자 환경을 사용합니다", e);
            KisEnvironment::Real
        });

        Some(Self {
            app_key: app_key.to_string(),
            app_secret: SecretString::from(app_secret.to_string()),
            environment,
            base_url: settings.base_url.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    /// 실제 요청에 사용할 REST 기본 URL.
    pub fn rest_base_url(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None => self.environment.rest_base_url(),
        }
    }

    /// 앱시크릿 평문 (요청 헤더/본문 작성용).
    pub(crate) fn app_secret_plain(&self) -> &str {
        self.app_secret.expose_secret()
    }
}

impl fmt::Debug for KisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KisConfig")
            .field("app_key", &format!("{}...", self.app_key.chars().take(4).collect::<String>()))
            .field("app_secret", &"[REDACTED]")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
