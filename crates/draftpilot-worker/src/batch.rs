//! Batch processing of several videos through one orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use draftpilot_models::{StyleConfig, VideoAsset};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cancel::CancellationSignal;
use crate::error::PipelineResult;
use crate::orchestrator::{DraftResult, Orchestrator};

/// Per-video outcome.
#[derive(Debug)]
pub struct BatchOutcome {
    pub path: PathBuf,
    pub result: PipelineResult<DraftResult>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs one orchestration per video with bounded parallelism.
///
/// All runs share the orchestrator's supervisor, so one server process serves
/// the whole batch. Each run writes its own draft id, so cut submission never
/// contends across videos.
pub struct BatchRunner {
    orchestrator: Arc<Orchestrator>,
    semaphore: Arc<Semaphore>,
    parallel_jobs: usize,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<Orchestrator>, parallel_jobs: usize) -> Self {
        let parallel_jobs = parallel_jobs.max(1);
        Self {
            orchestrator,
            semaphore: Arc::new(Semaphore::new(parallel_jobs)),
            parallel_jobs,
        }
    }

    /// Process every asset. Results keep the input order.
    pub async fn run(
        &self,
        assets: Vec<VideoAsset>,
        style: &StyleConfig,
        cancel: CancellationSignal,
    ) -> Vec<BatchOutcome> {
        info!(
            videos = assets.len(),
            parallel_jobs = self.parallel_jobs,
            style = %style.name,
            "Starting batch"
        );

        // Hold a lease for the whole batch so the server is not restarted between videos.
        let lease = match self.orchestrator.supervisor().acquire().await {
            Ok(lease) => Some(lease),
            Err(e) => {
                warn!("Draft server unavailable before batch start: {}", e);
                None
            }
        };

        let runs = assets.into_iter().map(|asset| {
            let semaphore = self.semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let cancel = cancel.clone();
            async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => orchestrator.run(&asset, style, cancel).await,
                    Err(_) => Err(crate::error::PipelineError::config_error("batch semaphore closed")),
                };
                BatchOutcome {
                    path: asset.path.clone(),
                    result,
                }
            }
        });
        let outcomes = join_all(runs).await;

        if let Some(lease) = lease {
            lease.release().await;
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            succeeded,
            failed = outcomes.len() - succeeded,
            "Batch complete"
        );
        outcomes
    }
}
