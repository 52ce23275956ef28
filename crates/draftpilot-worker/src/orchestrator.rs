//! End-to-end pipeline: server lease, analysis, planning, execution.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use draftpilot_ai::{ContentAnalyzer, LanguageModel, PlanGenerator};
use draftpilot_draft::DraftClient;
use draftpilot_models::{DraftId, DraftSession, EditingPlan, StyleConfig, VideoAsset};
use metrics::{counter, histogram};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::cancel::{self, CancellationSignal};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::{DraftLocks, ExecutionReport, PlanExecutor};
use crate::logging::RunLogger;
use crate::supervisor::{ServerLease, ServerStatus, ServerSupervisor};
use crate::translate::TranslationContext;

/// Metric name constants.
pub mod names {
    /// Pipeline runs by outcome.
    pub const RUNS_TOTAL: &str = "draftpilot_runs_total";

    /// End-to-end run duration in seconds.
    pub const RUN_DURATION_SECONDS: &str = "draftpilot_run_duration_seconds";
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct DraftResult {
    pub run_id: Uuid,
    pub draft_id: DraftId,
    /// Path returned by the draft server's `save_draft`
    pub draft_path: String,
    /// Overlay failures that did not block saving
    pub warnings: Vec<String>,
    pub session: DraftSession,
}

/// Composes supervisor, analyzer, generator and executor.
pub struct Orchestrator {
    supervisor: ServerSupervisor,
    analyzer: ContentAnalyzer,
    planner: PlanGenerator,
    executor: PlanExecutor,
    drafts_folder: String,
    session_log_dir: Option<PathBuf>,
    music_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(
        supervisor: ServerSupervisor,
        analyzer: ContentAnalyzer,
        planner: PlanGenerator,
        executor: PlanExecutor,
        drafts_folder: impl Into<String>,
    ) -> Self {
        Self {
            supervisor,
            analyzer,
            planner,
            executor,
            drafts_folder: drafts_folder.into(),
            session_log_dir: None,
            music_dir: PathBuf::from("assets/music"),
        }
    }

    /// Build every component from configuration around one provider.
    pub fn from_config(config: &PipelineConfig, model: Arc<dyn LanguageModel>) -> PipelineResult<Self> {
        let client = DraftClient::new(config.client.clone())
            .map_err(|e| PipelineError::config_error(format!("draft client: {e}")))?;
        let executor = PlanExecutor::new(client, &config.executor).with_locks(DraftLocks::new());

        let orchestrator = Self::new(
            ServerSupervisor::new(config.supervisor.clone()),
            ContentAnalyzer::new(model.clone()),
            PlanGenerator::new(model),
            executor,
            config.executor.drafts_folder.clone(),
        )
        .with_music_dir(&config.music_dir);
        Ok(match &config.session_log_dir {
            Some(dir) => orchestrator.with_session_log_dir(dir),
            None => orchestrator,
        })
    }

    /// Write every run's session record as `<dir>/<draft_id>.json`.
    pub fn with_session_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_log_dir = Some(dir.into());
        self
    }

    /// Look up per-style background music in `dir`.
    pub fn with_music_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.music_dir = dir.into();
        self
    }

    pub fn supervisor(&self) -> &ServerSupervisor {
        &self.supervisor
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    /// Run with a fresh `<stem>_<timestamp>` draft id.
    pub async fn run(
        &self,
        asset: &VideoAsset,
        style: &StyleConfig,
        cancel: CancellationSignal,
    ) -> PipelineResult<DraftResult> {
        let draft_id = DraftId::generate(&asset.stem());
        self.run_named(asset, style, draft_id, cancel).await
    }

    /// Run into a caller-chosen draft id.
    ///
    /// The server lease is released on every exit path.
    pub async fn run_named(
        &self,
        asset: &VideoAsset,
        style: &StyleConfig,
        draft_id: DraftId,
        cancel: CancellationSignal,
    ) -> PipelineResult<DraftResult> {
        let run_id = Uuid::new_v4();
        let logger = RunLogger::new(&draft_id, "orchestrate");
        let started = Instant::now();
        logger.log_start(&format!(
            "run {} for {} with style {}",
            run_id,
            asset.path.display(),
            style.name
        ));

        let style = style.clone().with_music_from(&self.music_dir);
        if let Some(track) = &style.music_track {
            info!(track = %track, "Using background music");
        }

        let result = async {
            let lease = self.supervisor.acquire().await?;
            let result = self
                .run_stages(&lease, asset, &style, &draft_id, &cancel)
                .await;
            lease.release().await;
            result
        }
        .instrument(logger.create_span())
        .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
        histogram!(names::RUN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        let session = match &result {
            Ok(report) => Some(&report.session),
            Err(e) => e.session(),
        };
        if let (Some(dir), Some(session)) = (&self.session_log_dir, session) {
            if let Err(e) = persist_session(dir, session).await {
                logger.log_warning(&format!("failed to write session log: {e}"));
            }
        }

        match result {
            Ok(report) => {
                logger.log_completion(&format!(
                    "draft {} saved to {} with {} warning(s)",
                    report.draft_id,
                    report.draft_path,
                    report.warnings.len()
                ));
                Ok(DraftResult {
                    run_id,
                    draft_id: report.draft_id,
                    draft_path: report.draft_path,
                    warnings: report.warnings,
                    session: report.session,
                })
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        lease: &ServerLease,
        asset: &VideoAsset,
        style: &StyleConfig,
        draft_id: &DraftId,
        cancel: &CancellationSignal,
    ) -> PipelineResult<ExecutionReport> {
        info!(pid = ?lease.handle().pid, adopted = lease.handle().adopted, "Draft server ready");

        let logger = RunLogger::new(draft_id, "analyze");
        let analysis = until_cancelled(cancel, draft_id, self.analyzer.analyze(asset)).await??;
        logger.log_progress(&format!(
            "{} scene(s), {} highlight(s)",
            analysis.scenes.len(),
            analysis.highlights.len()
        ));

        let logger = logger.for_operation("plan");
        let plan = until_cancelled(cancel, draft_id, self.planner.generate(&analysis, style)).await??;
        logger.log_progress(&format!("{} operation(s) planned", plan.operations.len()));

        let mut status = lease.status();
        if let Some(reason) = unavailable_reason(&status.borrow()) {
            return Err(PipelineError::server_unavailable(reason));
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled(Box::new(DraftSession::new(
                draft_id.clone(),
                &plan,
            ))));
        }

        let ctx = TranslationContext::new(asset, style, draft_id.clone(), self.drafts_folder.clone());
        let (exec_cancel, exec_signal) = cancel::pair();
        let execution = self.executor.execute(&plan, &ctx, &exec_signal);
        tokio::pin!(execution);

        let mut server_lost: Option<String> = None;
        let mut monitor_open = true;
        let outcome = loop {
            tokio::select! {
                result = &mut execution => break result,
                _ = cancel.cancelled(), if !exec_cancel.is_cancelled() => {
                    info!("Cancellation requested, letting in-flight calls finish");
                    exec_cancel.cancel();
                }
                changed = status.changed(), if monitor_open && server_lost.is_none() => {
                    if changed.is_err() {
                        monitor_open = false;
                        continue;
                    }
                    let lost = unavailable_reason(&status.borrow());
                    if let Some(reason) = lost {
                        warn!("Draft server lost during execution: {}", reason);
                        server_lost = Some(reason);
                        exec_cancel.cancel();
                    }
                }
            }
        };

        match (outcome, server_lost) {
            (Err(PipelineError::Cancelled(session)), Some(reason)) if !cancel.is_cancelled() => {
                Err(PipelineError::ServerLost { reason, session })
            }
            (outcome, _) => outcome,
        }
    }
}

fn unavailable_reason(status: &ServerStatus) -> Option<String> {
    match status {
        ServerStatus::Unavailable(reason) => Some(reason.clone()),
        _ => None,
    }
}

/// Race a pre-execution stage against cancellation.
async fn until_cancelled<T>(
    cancel: &CancellationSignal,
    draft_id: &DraftId,
    stage: impl Future<Output = T>,
) -> PipelineResult<T> {
    let cancelled = || {
        PipelineError::Cancelled(Box::new(DraftSession::new(
            draft_id.clone(),
            &EditingPlan::default(),
        )))
    };
    if cancel.is_cancelled() {
        return Err(cancelled());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled()),
        out = stage => Ok(out),
    }
}

async fn persist_session(dir: &Path, session: &DraftSession) -> PipelineResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.json", session.draft_id));
    let json = serde_json::to_vec_pretty(session)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
