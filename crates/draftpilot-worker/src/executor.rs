//! Plan execution against the draft server.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use draftpilot_draft::{DraftClient, DraftRequest};
use draftpilot_models::{
    DraftId, DraftSession, EditingPlan, OperationStatus, SaveRecord,
};
use futures::future::join_all;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, warn, Instrument};

use crate::cancel::CancellationSignal;
use crate::config::ExecutorConfig;
use crate::error::{ExecutionFailure, PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::translate::{translate, TranslationContext};

/// Per-draft mutual exclusion for the cut phase.
///
/// Concurrent executions against the same draft id serialise their cuts;
/// different drafts proceed independently. An entry lives only while some
/// execution holds or waits for it.
#[derive(Clone, Default)]
pub struct DraftLocks {
    inner: Arc<std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl DraftLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, draft_id: &DraftId) -> DraftGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(draft_id.as_str().to_string())
                .or_default()
                .clone()
        };
        DraftGuard {
            guard: Some(lock.lock_owned().await),
            draft_id: draft_id.as_str().to_string(),
            locks: self.clone(),
        }
    }

    fn evict_if_idle(&self, draft_id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(draft_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(draft_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Held lock on one draft. Dropping it releases the draft and forgets the
/// entry when nobody else is waiting.
pub struct DraftGuard {
    guard: Option<OwnedMutexGuard<()>>,
    draft_id: String,
    locks: DraftLocks,
}

impl Drop for DraftGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.evict_if_idle(&self.draft_id);
    }
}

/// Successful execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub draft_id: DraftId,
    /// Location returned by `save_draft`
    pub draft_path: String,
    /// One line per failed overlay
    pub warnings: Vec<String>,
    pub session: DraftSession,
}

/// Drives one plan through the draft client and records every outcome.
pub struct PlanExecutor {
    client: DraftClient,
    overlay_concurrency: usize,
    locks: DraftLocks,
}

impl PlanExecutor {
    pub fn new(client: DraftClient, config: &ExecutorConfig) -> Self {
        Self {
            client,
            overlay_concurrency: config.overlay_concurrency.max(1),
            locks: DraftLocks::new(),
        }
    }

    /// Share a lock registry with other executors.
    pub fn with_locks(mut self, locks: DraftLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn client(&self) -> &DraftClient {
        &self.client
    }

    /// Execute `plan` into the draft named by `ctx`.
    ///
    /// Cuts go out one at a time in plan order. Overlays follow once every
    /// cut is terminal, at most `overlay_concurrency` in flight. `save_draft`
    /// is called once, and only if every cut was acknowledged. Calls already
    /// in flight when `cancel` fires run to completion; nothing new is sent.
    pub async fn execute(
        &self,
        plan: &EditingPlan,
        ctx: &TranslationContext,
        cancel: &CancellationSignal,
    ) -> PipelineResult<ExecutionReport> {
        let translated = translate(plan, ctx).map_err(PipelineError::PlanInvalid)?;
        let logger = RunLogger::new(&ctx.draft_id, "execute");
        let session = Arc::new(Mutex::new(DraftSession::new(ctx.draft_id.clone(), plan)));

        logger.log_start(&format!(
            "{} cut(s), {} overlay(s)",
            translated.cuts.len(),
            translated.overlays.len()
        ));

        let mut cancelled = false;
        {
            let _draft_guard = self.locks.lock(&ctx.draft_id).await;
            for (index, request) in &translated.cuts {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                self.deliver(&session, *index, request)
                    .instrument(logger.create_span())
                    .await?;
            }
        }

        if !cancelled {
            let semaphore = Semaphore::new(self.overlay_concurrency);
            let deliveries = translated.overlays.iter().map(|(index, request)| {
                let semaphore = &semaphore;
                let session = &session;
                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return Ok(());
                    };
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    self.deliver(session, *index, request).await
                }
            });
            for result in join_all(deliveries).instrument(logger.create_span()).await {
                result?;
            }
            cancelled = cancel.is_cancelled();
        }

        let mut session = session.lock().await.clone();

        if cancelled {
            session.finish();
            logger.log_warning(&format!(
                "cancelled with {} acknowledged, {} pending",
                session.count(OperationStatus::Acknowledged),
                session.count(OperationStatus::Pending)
            ));
            return Err(PipelineError::Cancelled(Box::new(session)));
        }

        if !session.all_cuts_acknowledged() {
            session.finish();
            let failed = session.failed().cloned().collect();
            let failure = ExecutionFailure {
                session,
                failed,
                save_failure: None,
            };
            logger.log_error(&format!(
                "{} cut(s) failed, skipping save_draft",
                failure.failed_cut_count()
            ));
            return Err(PipelineError::PlanExecutionFailed(Box::new(failure)));
        }

        let draft_path = match self.client.save_draft(&translated.save).await {
            Ok(ack) => {
                session.record_save(SaveRecord {
                    status: OperationStatus::Acknowledged,
                    attempts: ack.attempts,
                    draft_path: Some(ack.draft_path.clone()),
                    failure: None,
                })?;
                ack.draft_path
            }
            Err(failure) => {
                let detail = failure.to_operation_failure();
                session.record_save(SaveRecord {
                    status: OperationStatus::Failed,
                    attempts: failure.attempts,
                    draft_path: None,
                    failure: Some(detail.clone()),
                })?;
                session.finish();
                logger.log_error(&format!("save_draft failed: {failure}"));
                let failed = session.failed().cloned().collect();
                return Err(PipelineError::PlanExecutionFailed(Box::new(ExecutionFailure {
                    session,
                    failed,
                    save_failure: Some(detail),
                })));
            }
        };
        session.finish();

        let warnings: Vec<String> = session
            .failed()
            .map(|r| match &r.failure {
                Some(f) => format!("operation {} ({}) failed: {}", r.index, r.kind, f),
                None => format!("operation {} ({}) failed", r.index, r.kind),
            })
            .collect();
        for warning in &warnings {
            logger.log_warning(warning);
        }
        logger.log_completion(&format!("draft saved to {draft_path}"));

        Ok(ExecutionReport {
            draft_id: ctx.draft_id.clone(),
            draft_path,
            warnings,
            session,
        })
    }

    /// One operation through `pending -> sent -> acknowledged | failed`.
    async fn deliver(
        &self,
        session: &Mutex<DraftSession>,
        index: usize,
        request: &DraftRequest,
    ) -> PipelineResult<()> {
        session.lock().await.mark_sent(index)?;

        let result = self.client.send(request).await;

        let mut session = session.lock().await;
        match result {
            Ok(ack) => {
                debug!(
                    index,
                    endpoint = %request.endpoint(),
                    attempts = ack.attempts,
                    element_id = ?ack.element_id,
                    "Operation acknowledged"
                );
                session.mark_acknowledged(index, ack.attempts, ack.element_id)?;
            }
            Err(failure) => {
                warn!(
                    index,
                    endpoint = %failure.endpoint,
                    kind = %failure.kind(),
                    attempts = failure.attempts,
                    "Operation failed: {}",
                    failure.source
                );
                session.mark_failed(index, failure.to_operation_failure())?;
            }
        }
        Ok(())
    }
}
