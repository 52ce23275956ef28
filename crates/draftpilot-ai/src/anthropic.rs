//! Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AiError, AiResult};
use crate::provider::{CompletionRequest, LanguageModel};

const API_VERSION: &str = "2023-06-01";
const RETRY_BASE: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(30);

/// Exponential delay before retry `attempt`, capped at [`RETRY_MAX`].
fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    RETRY_BASE.saturating_mul(factor).min(RETRY_MAX)
}

/// Configuration for the Anthropic client.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Upper bound applied to every request's `max_tokens`
    pub max_tokens: u32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "claude-3-sonnet-20240229".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 2000,
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AiError::config_error("ANTHROPIC_API_KEY not set"))?;
        let defaults = Self::new(api_key);

        Ok(Self {
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.model.clone()),
            base_url: std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url.clone()),
            max_tokens: std::env::var("AI_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
            timeout: std::env::var("AI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("AI_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            ..defaults
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    http: Client,
    config: AnthropicConfig,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::config_error(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(AnthropicConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn call_once(&self, request: &CompletionRequest) -> AiResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens.min(self.config.max_tokens),
            system: &request.system,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Http { status, body });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(e.to_string()))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|c| c.kind == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AiError::EmptyCompletion);
        }
        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> AiResult<String> {
        let mut attempt = 0;
        loop {
            match self.call_once(request).await {
                Ok(text) => {
                    debug!(model = %self.config.model, chars = text.len(), "Provider completion received");
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(attempt);
                    warn!(
                        "Provider request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
