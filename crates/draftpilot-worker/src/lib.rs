//! Editing orchestration pipeline.
//!
//! This crate provides:
//! - Draft server supervision (adopt or launch, health monitor, bounded restarts)
//! - Plan-to-call translation and the ordered plan executor
//! - The orchestrator composing analysis, planning and execution
//! - Batch processing with bounded parallelism
//! - Cooperative cancellation

pub mod batch;
pub mod cancel;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod retry;
pub mod supervisor;
pub mod translate;

pub use batch::{BatchOutcome, BatchRunner};
pub use cancel::{CancelHandle, CancellationSignal};
pub use config::{ExecutorConfig, PipelineConfig, SupervisorConfig};
pub use error::{ExecutionFailure, PipelineError, PipelineResult};
pub use executor::{DraftGuard, DraftLocks, ExecutionReport, PlanExecutor};
pub use logging::RunLogger;
pub use orchestrator::{DraftResult, Orchestrator};
pub use supervisor::{
    CommandLauncher, LivenessProbe, ProcessLauncher, ServerHandle, ServerHealth, ServerLease,
    ServerProcess, ServerStatus, ServerSupervisor, TcpProbe,
};
pub use translate::{translate, TranslatedPlan, TranslationContext};
