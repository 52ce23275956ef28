//! Structured run logging.
//!
//! Every pipeline run logs with the same `draft_id` and `operation` fields so
//! JSON output can be filtered per draft.

use draftpilot_models::DraftId;
use tracing::{error, info, warn, Span};

/// Logger bound to one draft and pipeline stage.
#[derive(Debug, Clone)]
pub struct RunLogger {
    draft_id: String,
    operation: String,
}

impl RunLogger {
    pub fn new(draft_id: &DraftId, operation: &str) -> Self {
        Self {
            draft_id: draft_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Same draft, different stage.
    pub fn for_operation(&self, operation: &str) -> Self {
        Self {
            draft_id: self.draft_id.clone(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            draft_id = %self.draft_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            draft_id = %self.draft_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            draft_id = %self.draft_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            draft_id = %self.draft_id,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            draft_id = %self.draft_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn draft_id(&self) -> &str {
        &self.draft_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span to instrument the run's futures with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            draft_id = %self.draft_id,
            operation = %self.operation
        )
    }
}
