//! Language-model provider seam.

use async_trait::async_trait;

use crate::error::AiResult;

/// One prompt/response exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// A provider that turns a prompt into text.
///
/// Implementations own their transient-failure policy; callers never retry.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> AiResult<String>;
}

/// Strip optional markdown code fences around a JSON payload.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}
