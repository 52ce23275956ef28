//! Error types for the language-model stages.

use draftpilot_models::PlanViolation;
use thiserror::Error;

/// Result type for language-model operations.
pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider request failed: {0}")]
    Network(String),

    #[error("Provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Provider returned no text content")]
    EmptyCompletion,

    /// A successful response whose body could not be decoded.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The analysis stage could not produce a usable analysis.
    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    /// The plan payload violates an invariant.
    #[error("Plan invalid ({}): {}", .0.invariant(), .0)]
    PlanInvalid(PlanViolation),

    /// The provider could not be reached for plan generation.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn analysis_unavailable(msg: impl Into<String>) -> Self {
        Self::AnalysisUnavailable(msg.into())
    }

    /// Network failures, rate limits and provider-side errors are transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
