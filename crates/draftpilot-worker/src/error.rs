//! Pipeline error types.

use draftpilot_ai::AiError;
use draftpilot_models::{DraftSession, OperationFailure, OperationRecord, PlanViolation, SessionError};
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Aggregate failure of a plan execution.
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    /// Session state when execution stopped
    pub session: DraftSession,
    /// Every operation that ended `failed`
    pub failed: Vec<OperationRecord>,
    /// Present when every cut succeeded but `save_draft` did not
    pub save_failure: Option<OperationFailure>,
}

impl ExecutionFailure {
    pub fn failed_cut_count(&self) -> usize {
        self.failed
            .iter()
            .filter(|r| !r.kind.is_overlay())
            .count()
    }

    fn summary(&self) -> String {
        if let Some(save) = &self.save_failure {
            return format!("save_draft failed: {save}");
        }
        let details: Vec<String> = self
            .failed
            .iter()
            .map(|r| match &r.failure {
                Some(f) => format!("#{} {} ({})", r.index, r.kind, f),
                None => format!("#{} {}", r.index, r.kind),
            })
            .collect();
        format!(
            "{} cut(s) failed, draft not saved: {}",
            self.failed_cut_count(),
            details.join("; ")
        )
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Draft server unavailable: {0}")]
    ServerUnavailable(String),

    /// The server became unavailable while a plan was executing.
    #[error("Draft server lost during execution: {reason}")]
    ServerLost {
        reason: String,
        session: Box<DraftSession>,
    },

    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Plan invalid ({}): {}", .0.invariant(), .0)]
    PlanInvalid(PlanViolation),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Plan execution failed: {}", .0.summary())]
    PlanExecutionFailed(Box<ExecutionFailure>),

    #[error("Cancelled after {} acknowledged operation(s)", .0.count(draftpilot_models::OperationStatus::Acknowledged))]
    Cancelled(Box<DraftSession>),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Media error: {0}")]
    Media(#[from] draftpilot_media::MediaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn server_unavailable(msg: impl Into<String>) -> Self {
        Self::ServerUnavailable(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Session record carried by execution-stage errors.
    pub fn session(&self) -> Option<&DraftSession> {
        match self {
            PipelineError::PlanExecutionFailed(failure) => Some(&failure.session),
            PipelineError::Cancelled(session) => Some(session),
            PipelineError::ServerLost { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ServerUnavailable(_) | PipelineError::ServerLost { .. } => {
                "server_unavailable"
            }
            PipelineError::AnalysisUnavailable(_) => "analysis_unavailable",
            PipelineError::PlanInvalid(_) => "plan_invalid",
            PipelineError::ProviderUnavailable(_) => "provider_unavailable",
            PipelineError::PlanExecutionFailed(_) => "plan_execution_failed",
            PipelineError::Cancelled(_) => "cancelled",
            PipelineError::Session(_) => "session",
            PipelineError::Media(_) => "media",
            PipelineError::Config(_) => "config",
            PipelineError::Io(_) => "io",
        }
    }

    /// Whether re-running the whole pipeline could succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::ServerUnavailable(_)
                | PipelineError::ServerLost { .. }
                | PipelineError::AnalysisUnavailable(_)
                | PipelineError::ProviderUnavailable(_)
        )
    }
}

impl From<AiError> for PipelineError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::AnalysisUnavailable(msg) => PipelineError::AnalysisUnavailable(msg),
            AiError::PlanInvalid(violation) => PipelineError::PlanInvalid(violation),
            AiError::ProviderUnavailable(msg) => PipelineError::ProviderUnavailable(msg),
            AiError::Config(msg) => PipelineError::Config(msg),
            other => PipelineError::ProviderUnavailable(other.to_string()),
        }
    }
}
