//! LLM 요약 클라이언트.
//!
//! OpenAI 호환 chat completions 엔드포인트를 호출합니다. 재시도나 스트리밍은
//! 하지 않으며, 실패는 한 번의 에러로 반환됩니다.

use std::time::Duration;

use async_trait::async_trait;
use brief_core::{BriefError, SummarizerConfig, SummaryPrompt};
use metrics::counter;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

/// 요약 호출 에러.
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("요약 API 요청 실패: {0}")]
    Request(#[from] reqwest::Error),

    #[error("요약 API 오류 응답 ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("요약 API 요청 한도 초과")]
    RateLimited,

    #[error("요약 결과가 비어 있습니다")]
    EmptyResponse,

    #[error("요약 API 설정 오류: {0}")]
    Config(String),
}

impl From<SummarizerError> for BriefError {
    fn from(err: SummarizerError) -> Self {
        match err {
            SummarizerError::Request(e) if e.is_timeout() || e.is_connect() => {
                BriefError::Network(e.to_string())
            }
            SummarizerError::RateLimited => BriefError::RateLimit(err.to_string()),
            SummarizerError::Config(msg) => BriefError::Config(msg),
            other => BriefError::Upstream(other.to_string()),
        }
    }
}

/// 프롬프트를 받아 요약문을 돌려주는 모델.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, prompt: &SummaryPrompt) -> Result<String, SummarizerError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI 호환 요약 클라이언트.
pub struct OpenAiSummarizer {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenAiSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSummarizer")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl OpenAiSummarizer {
    /// 설정으로 생성. API 키가 없으면 `None`.
    pub fn from_config(config: &SummarizerConfig) -> Result<Option<Self>, SummarizerError> {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Self::new(config, key).map(Some),
            _ => Ok(None),
        }
    }

    pub fn new(config: &SummarizerConfig, api_key: &str) -> Result<Self, SummarizerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SummarizerError::Config(format!("HTTP client 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: SecretString::from(api_key.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.user.len()))]
    async fn summarize(&self, prompt: &SummaryPrompt) -> Result<String, SummarizerError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .inspect_err(|_| {
                counter!("summarize_requests_total", "status" => "error").increment(1);
            })?;

        let status = response.status();
        if !status.is_success() {
            counter!("summarize_requests_total", "status" => "error").increment(1);
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Summarizer request rejected");

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(SummarizerError::RateLimited);
            }
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
            return Err(SummarizerError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                counter!("summarize_requests_total", "status" => "empty").increment(1);
                SummarizerError::EmptyResponse
            })?;

        counter!("summarize_requests_total", "status" => "ok").increment(1);
        debug!(summary_len = text.len(), "Summary generated");
        Ok(text)
    }
}
