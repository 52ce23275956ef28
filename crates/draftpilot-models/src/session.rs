//! Draft execution session record.

use chrono::{DateTime, Local, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::plan::{EditingPlan, OperationKind};

/// Identifier of a draft on the draft server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct DraftId(pub String);

impl DraftId {
    /// Unique name of the form `<stem>_<YYYYmmdd_HHMMSS>`.
    pub fn generate(stem: &str) -> Self {
        Self::generate_at(stem, Local::now())
    }

    pub fn generate_at<Tz: chrono::TimeZone>(stem: &str, at: DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(format!("{}_{}", stem, at.format("%Y%m%d_%H%M%S")))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DraftId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DraftId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Delivery state of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    Sent,
    Acknowledged,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Sent => "sent",
            OperationStatus::Acknowledged => "acknowledged",
            OperationStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Acknowledged | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure class of a draft server call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Server refused the request (4xx or `success: false`)
    Rejected,
    /// Connect error or timeout
    Unreachable,
    /// 5xx
    ServerError,
    /// 2xx with an undecodable body
    InvalidResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Rejected => "rejected",
            FailureKind::Unreachable => "unreachable",
            FailureKind::ServerError => "server_error",
            FailureKind::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal failure detail of one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationFailure {
    pub kind: FailureKind,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub message: String,
    pub attempts: u32,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} after {} attempt(s)", self.endpoint, self.kind, self.attempts)?;
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {code})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Per-operation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationRecord {
    /// Index in the plan
    pub index: usize,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationFailure>,
}

/// Outcome of the final `save_draft` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SaveRecord {
    pub status: OperationStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<OperationFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("operation {0} is not part of this session")]
    UnknownOperation(usize),

    #[error("operation {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: usize,
        from: OperationStatus,
        to: OperationStatus,
    },

    #[error("save_draft was already recorded")]
    SaveAlreadyRecorded,
}

/// Execution record for one plan against one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DraftSession {
    pub draft_id: DraftId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub operations: Vec<OperationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save: Option<SaveRecord>,
}

impl DraftSession {
    /// New session with every operation of `plan` pending.
    pub fn new(draft_id: DraftId, plan: &EditingPlan) -> Self {
        let operations = plan
            .operations
            .iter()
            .enumerate()
            .map(|(index, op)| OperationRecord {
                index,
                kind: op.kind(),
                status: OperationStatus::Pending,
                attempts: 0,
                element_id: None,
                failure: None,
            })
            .collect();

        Self {
            draft_id,
            started_at: Utc::now(),
            finished_at: None,
            operations,
            save: None,
        }
    }

    pub fn record(&self, index: usize) -> Option<&OperationRecord> {
        self.operations.get(index)
    }

    fn transition(
        &mut self,
        index: usize,
        from: OperationStatus,
        to: OperationStatus,
    ) -> Result<&mut OperationRecord, SessionError> {
        let record = self
            .operations
            .get_mut(index)
            .ok_or(SessionError::UnknownOperation(index))?;
        if record.status != from {
            return Err(SessionError::InvalidTransition {
                index,
                from: record.status,
                to,
            });
        }
        record.status = to;
        Ok(record)
    }

    /// `pending -> sent`
    pub fn mark_sent(&mut self, index: usize) -> Result<(), SessionError> {
        self.transition(index, OperationStatus::Pending, OperationStatus::Sent)?;
        Ok(())
    }

    /// `sent -> acknowledged`
    pub fn mark_acknowledged(
        &mut self,
        index: usize,
        attempts: u32,
        element_id: Option<String>,
    ) -> Result<(), SessionError> {
        let record = self.transition(index, OperationStatus::Sent, OperationStatus::Acknowledged)?;
        record.attempts = attempts;
        record.element_id = element_id;
        Ok(())
    }

    /// `sent -> failed`
    pub fn mark_failed(&mut self, index: usize, failure: OperationFailure) -> Result<(), SessionError> {
        let record = self.transition(index, OperationStatus::Sent, OperationStatus::Failed)?;
        record.attempts = failure.attempts;
        record.failure = Some(failure);
        Ok(())
    }

    pub fn record_save(&mut self, save: SaveRecord) -> Result<(), SessionError> {
        if self.save.is_some() {
            return Err(SessionError::SaveAlreadyRecorded);
        }
        self.save = Some(save);
        Ok(())
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations.iter().filter(|r| r.status == status).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &OperationRecord> {
        self.operations
            .iter()
            .filter(|r| r.status == OperationStatus::Failed)
    }

    pub fn failed_cuts(&self) -> Vec<OperationRecord> {
        self.failed()
            .filter(|r| r.kind == OperationKind::Cut)
            .cloned()
            .collect()
    }

    pub fn all_cuts_acknowledged(&self) -> bool {
        self.operations
            .iter()
            .filter(|r| r.kind == OperationKind::Cut)
            .all(|r| r.status == OperationStatus::Acknowledged)
    }

    pub fn is_terminal(&self) -> bool {
        self.operations.iter().all(|r| r.status.is_terminal())
    }

    pub fn draft_path(&self) -> Option<&str> {
        self.save.as_ref().and_then(|s| s.draft_path.as_deref())
    }
}
