//! Draft client error types.

use draftpilot_models::{FailureKind, OperationFailure};
use thiserror::Error;

use crate::types::Endpoint;

/// Result type for draft server calls.
pub type DraftResult<T> = Result<T, DraftError>;

/// Outcome of a single failed attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    /// 4xx, or a 2xx carrying `success: false`
    #[error("rejected: {message}")]
    Rejected { status: Option<u16>, message: String },

    /// Connect error or timeout
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// 5xx
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// 2xx whose body cannot be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl DraftError {
    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable(message.into())
    }

    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Only transport-level and 5xx failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DraftError::Unreachable(_) | DraftError::ServerError { .. })
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            DraftError::Rejected { .. } => FailureKind::Rejected,
            DraftError::Unreachable(_) => FailureKind::Unreachable,
            DraftError::ServerError { .. } => FailureKind::ServerError,
            DraftError::InvalidResponse(_) => FailureKind::InvalidResponse,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            DraftError::Rejected { status, .. } => *status,
            DraftError::ServerError { status, .. } => Some(*status),
            DraftError::Unreachable(_) | DraftError::InvalidResponse(_) => None,
        }
    }

    /// Metric label for this outcome.
    pub fn outcome(&self) -> &'static str {
        self.kind().as_str()
    }
}

/// Terminal failure of a call after retries.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{endpoint} failed after {attempts} attempt(s): {source}")]
pub struct CallFailure {
    pub endpoint: Endpoint,
    pub attempts: u32,
    #[source]
    pub source: DraftError,
}

impl CallFailure {
    pub fn kind(&self) -> FailureKind {
        self.source.kind()
    }

    /// Failure detail for the session record.
    pub fn to_operation_failure(&self) -> OperationFailure {
        let message = match &self.source {
            DraftError::Rejected { message, .. } | DraftError::ServerError { message, .. } => {
                message.clone()
            }
            DraftError::Unreachable(m) | DraftError::InvalidResponse(m) => m.clone(),
        };
        OperationFailure {
            kind: self.source.kind(),
            endpoint: self.endpoint.path().to_string(),
            status_code: self.source.status_code(),
            message,
            attempts: self.attempts,
        }
    }
}
