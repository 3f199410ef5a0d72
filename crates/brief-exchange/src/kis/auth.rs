//! KIS OAuth 2.0 접근 토큰 캐시.
//!
//! 접근 토큰은 발급 횟수가 제한되므로 프로세스 전체에서 하나의
//! [`TokenCache`]를 공유합니다. 만료 60초 전부터는 새 토큰을 발급받고,
//! 동시에 여러 요청이 갱신을 시도해도 토큰 요청은 한 번만 나갑니다.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use super::config::KisConfig;
use crate::ExchangeError;

/// 만료 시각에서 미리 빼는 여유 시간 (초).
const EXPIRY_SKEW_SECS: i64 = 60;

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// KIS OAuth 토큰 응답.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
    /// 토큰 만료 시간 (초)
    pub expires_in: i64,
}

/// KIS API 오류 응답.
#[derive(Debug, Clone, Deserialize)]
pub struct KisErrorResponse {
    /// 응답 코드 (0 = 성공)
    pub rt_cd: String,
    /// 메시지 코드
    pub msg_cd: String,
    /// 메시지 내용
    pub msg1: String,
}

/// KIS OAuth 오류 응답 (토큰 발급 실패 시).
#[derive(Debug, Clone, Deserialize)]
pub struct KisOAuthErrorResponse {
    /// 에러 코드 (예: "EGW00103")
    pub error_code: String,
    /// 에러 설명
    pub error_description: String,
}

/// 만료 추적이 포함된 토큰 상태.
#[derive(Debug, Clone)]
pub struct TokenState {
    /// 접근 토큰
    pub access_token: String,
    /// 토큰 타입
    pub token_type: String,
    /// 만료 시각 (여유 시간 차감 후)
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// 토큰 응답에서 생성. `expires_at = now + expires_in - 60s`.
    pub fn from_response(resp: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token,
            token_type: resp.token_type,
            expires_at: now + Duration::seconds(resp.expires_in - EXPIRY_SKEW_SECS),
        }
    }

    /// 주어진 시각에 토큰이 유효한지 확인.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// 토큰이 지금 유효한지 확인.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// 인증 헤더 값 반환.
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// 공유 접근 토큰 캐시.
pub struct TokenCache {
    config: KisConfig,
    client: Client,
    token: RwLock<Option<TokenState>>,
    refresh_lock: Mutex<()>,
}

impl TokenCache {
    /// 새 토큰 캐시 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: KisConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// 클라이언트 설정.
    pub fn config(&self) -> &KisConfig {
        &self.config
    }

    /// 현재 캐시된 토큰 (API 호출 없이).
    pub async fn cached(&self) -> Option<TokenState> {
        self.token.read().await.clone()
    }

    /// 유효한 접근 토큰 반환, 필요시 발급.
    pub async fn get_token(&self) -> Result<TokenState, ExchangeError> {
        if let Some(token) = self.valid_cached().await {
            debug!("Using cached KIS token (expires at: {})", token.expires_at);
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // 대기하는 동안 다른 요청이 이미 갱신했을 수 있음
        if let Some(token) = self.valid_cached().await {
            return Ok(token);
        }

        let token = self.request_token().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    /// 캐시를 비웁니다. 다음 요청에서 새 토큰을 발급받습니다.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    async fn valid_cached(&self) -> Option<TokenState> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_valid())
            .cloned()
    }

    async fn request_token(&self) -> Result<TokenState, ExchangeError> {
        info!(
            "Requesting new KIS access token... (AppKey: {}...)",
            self.config.app_key.chars().take(8).collect::<String>()
        );

        #[derive(Serialize)]
        struct TokenRequest<'a> {
            grant_type: &'a str,
            appkey: &'a str,
            appsecret: &'a str,
        }

        let url = format!("{}/oauth2/tokenP", self.config.rest_base_url());
        let request_body = TokenRequest {
            grant_type: "client_credentials",
            appkey: &self.config.app_key,
            appsecret: self.config.app_secret_plain(),
        };

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, JSON_UTF8)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Token request failed: {} - {}", status, body);
            return Err(token_error(&body));
        }

        let token_resp: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ExchangeError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        let token = TokenState::from_response(token_resp, Utc::now());
        metrics::counter!("kis_token_refresh_total").increment(1);
        info!("KIS access token obtained, expires at: {}", token.expires_at);

        Ok(token)
    }

    /// 시세 조회 요청 헤더 생성.
    pub async fn build_headers(&self, tr_id: &str) -> Result<HeaderMap, ExchangeError> {
        let token = self.get_token().await?;

        let parse = |name: &str, value: &str| {
            HeaderValue::from_str(value)
                .map_err(|e| ExchangeError::ParseError(format!("잘못된 {} 헤더: {}", name, e)))
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
        headers.insert(AUTHORIZATION, parse("authorization", &token.auth_header())?);
        headers.insert("appkey", parse("appkey", &self.config.app_key)?);
        headers.insert("appsecret", parse("appsecret", self.config.app_secret_plain())?);
        headers.insert("tr_id", parse("tr_id", tr_id)?);
        headers.insert("custtype", HeaderValue::from_static("P"));

        Ok(headers)
    }
}

/// 토큰 발급 실패 응답을 에러로 변환합니다.
fn token_error(body: &str) -> ExchangeError {
    if let Ok(oauth_error) = serde_json::from_str::<KisOAuthErrorResponse>(body) {
        let message = match oauth_error.error_code.as_str() {
            "EGW00103" => "유효하지 않은 AppKey입니다. KIS_APP_KEY, KIS_APP_SECRET을 확인하세요.".to_string(),
            "EGW00102" => "AppKey가 만료되었습니다.".to_string(),
            "EGW00101" => "AppSecret이 일치하지 않습니다.".to_string(),
            "EGW00133" => return ExchangeError::RateLimited,
            _ => format!("{} ({})", oauth_error.error_description, oauth_error.error_code),
        };
        return ExchangeError::Unauthorized(message);
    }

    if let Ok(error_resp) = serde_json::from_str::<KisErrorResponse>(body) {
        return ExchangeError::ApiError {
            code: error_resp.msg_cd.parse().unwrap_or(-1),
            message: error_resp.msg1,
        };
    }

    ExchangeError::Unauthorized(format!("Token request failed: {}", body))
}
