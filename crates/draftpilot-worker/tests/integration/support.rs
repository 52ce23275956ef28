//! Fakes shared by the integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use draftpilot_ai::{AiError, AiResult, CompletionRequest, LanguageModel};
use draftpilot_draft::{DraftClient, DraftError, DraftResult, DraftTransport, Endpoint};
use draftpilot_models::{
    DraftId, EditOperation, EditingPlan, StyleConfig, TextOverlay, VideoAsset, VideoCut,
};
use draftpilot_worker::cancel::CancelHandle;
use draftpilot_worker::{
    ExecutorConfig, LivenessProbe, PlanExecutor, ProcessLauncher, ServerProcess, SupervisorConfig,
    TranslationContext,
};
use serde_json::{json, Value};

/// One recorded draft call.
#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: Endpoint,
    pub body: Value,
}

impl Call {
    pub fn start(&self) -> f64 {
        self.body["start"].as_f64().unwrap_or(f64::NAN)
    }
}

/// Draft transport with per-endpoint scripted failures.
///
/// Each endpoint's queue is consumed one entry per call; an empty queue
/// acknowledges. Cut calls are checked for overlap.
#[derive(Default)]
pub struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    script: Mutex<HashMap<Endpoint, VecDeque<DraftError>>>,
    rejected_starts: Mutex<Vec<(Endpoint, f64)>>,
    delay: Mutex<Option<Duration>>,
    cut_in_flight: AtomicUsize,
    overlay_in_flight: AtomicUsize,
    pub max_overlay_in_flight: AtomicUsize,
    pub cut_overlap: AtomicBool,
    cancel_after_first_cut: Mutex<Option<CancelHandle>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next calls to `endpoint` with `errors`, in order.
    pub fn fail(&self, endpoint: Endpoint, errors: Vec<DraftError>) {
        self.script
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .extend(errors);
    }

    /// Reject every call to `endpoint` whose `start` equals `start`.
    pub fn reject_start(&self, endpoint: Endpoint, start: f64) {
        self.rejected_starts.lock().unwrap().push((endpoint, start));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Cancel `handle` once the first cut call has returned.
    pub fn cancel_after_first_cut(&self, handle: CancelHandle) {
        *self.cancel_after_first_cut.lock().unwrap() = Some(handle);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.calls().into_iter().map(|c| c.endpoint).collect()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.endpoints().into_iter().filter(|e| *e == endpoint).count()
    }

    fn outcome(&self, endpoint: Endpoint, body: &Value) -> DraftResult<Value> {
        if let Some(err) = self
            .script
            .lock()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        let start = body["start"].as_f64();
        let rejected = self
            .rejected_starts
            .lock()
            .unwrap()
            .iter()
            .any(|(e, s)| *e == endpoint && Some(*s) == start);
        if rejected {
            return Err(DraftError::rejected(Some(400), "invalid parameters"));
        }
        Ok(match endpoint {
            Endpoint::SaveDraft => json!({
                "success": true,
                "output": {"draft_path": format!("/drafts/{}", body["draft_id"].as_str().unwrap_or(""))}
            }),
            _ => json!({"success": true, "output": {"material_id": format!("m-{}", self.calls.lock().unwrap().len())}}),
        })
    }
}

#[async_trait]
impl DraftTransport for ScriptedTransport {
    async fn post(&self, endpoint: Endpoint, body: &Value) -> DraftResult<Value> {
        self.calls.lock().unwrap().push(Call {
            endpoint,
            body: body.clone(),
        });

        let is_cut = endpoint == Endpoint::AddVideo;
        let is_overlay = !is_cut && endpoint != Endpoint::SaveDraft;
        if is_cut && self.cut_in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.cut_overlap.store(true, Ordering::SeqCst);
        }
        if is_overlay {
            let now = self.overlay_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_overlay_in_flight.fetch_max(now, Ordering::SeqCst);
        }

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.outcome(endpoint, body);

        if is_cut {
            self.cut_in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(handle) = self.cancel_after_first_cut.lock().unwrap().take() {
                handle.cancel();
            }
        }
        if is_overlay {
            self.overlay_in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }

    async fn probe(&self, _endpoint: Endpoint) -> DraftResult<u16> {
        Ok(200)
    }
}

pub fn client(transport: Arc<ScriptedTransport>, max_attempts: u32) -> DraftClient {
    DraftClient::with_transport(transport, max_attempts, Duration::from_millis(1))
}

pub fn executor(transport: Arc<ScriptedTransport>, overlay_concurrency: usize) -> PlanExecutor {
    let config = ExecutorConfig {
        overlay_concurrency,
        ..ExecutorConfig::default()
    };
    PlanExecutor::new(client(transport, 3), &config)
}

pub fn asset(duration: f64) -> VideoAsset {
    VideoAsset::new("/in/trip.mp4", duration, 1920, 1080)
}

pub fn ctx(draft_id: &str) -> TranslationContext {
    TranslationContext::new(
        &asset(120.0),
        &StyleConfig::new("test"),
        DraftId::from(draft_id),
        "./drafts",
    )
}

pub fn cut(start: f64, end: f64) -> EditOperation {
    EditOperation::Cut(VideoCut::new(start, end))
}

pub fn text(content: &str, start: f64, end: f64) -> EditOperation {
    EditOperation::Text(TextOverlay::new(content, start, end))
}

/// The 120-second scenario plan.
pub fn scenario_plan() -> EditingPlan {
    EditingPlan::new(vec![cut(0.0, 30.0), cut(60.0, 90.0), text("Hi", 2.0, 5.0)])
}

/// Replays scripted probe results, then a default.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    default: bool,
    pub checks: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: Vec<bool>, default: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            default,
            checks: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LivenessProbe for ScriptedProbe {
    async fn check(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(self.default)
    }
}

/// Launcher whose processes only count terminations.
#[derive(Default)]
pub struct FakeLauncher {
    pub launches: AtomicUsize,
    pub terminated: Arc<AtomicUsize>,
}

struct FakeProcess {
    pid: u32,
    terminated: Arc<AtomicUsize>,
}

#[async_trait]
impl ServerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_exited(&mut self) -> Option<String> {
        None
    }

    async fn terminate(&mut self, _grace: Duration) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, _config: &SupervisorConfig) -> std::io::Result<Box<dyn ServerProcess>> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) as u32;
        Ok(Box::new(FakeProcess {
            pid: 7000 + n,
            terminated: self.terminated.clone(),
        }))
    }
}

pub fn fast_supervisor_config() -> SupervisorConfig {
    SupervisorConfig {
        poll_base: Duration::from_millis(1),
        poll_max: Duration::from_millis(4),
        poll_attempts: 4,
        monitor_interval: Duration::from_millis(5),
        failure_threshold: 3,
        max_restarts: 1,
        grace_period: Duration::from_millis(10),
        ..SupervisorConfig::default()
    }
}

/// Answers the analysis prompt and the plan prompt with fixed JSON.
pub struct CannedModel {
    pub analysis: String,
    pub plan: String,
}

impl CannedModel {
    pub fn new(analysis: &str, plan: &str) -> Arc<Self> {
        Arc::new(Self {
            analysis: analysis.to_string(),
            plan: plan.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for CannedModel {
    async fn complete(&self, request: &CompletionRequest) -> AiResult<String> {
        if request.prompt.starts_with("Analyze") {
            Ok(self.analysis.clone())
        } else if request.prompt.starts_with("Plan") {
            Ok(self.plan.clone())
        } else {
            Err(AiError::EmptyCompletion)
        }
    }
}

pub const ANALYSIS: &str = r#"{
  "content_type": "travel vlog",
  "scenes": [
    {"start": 0, "end": 40, "motion": "moderate", "brightness": "normal"},
    {"start": 40, "end": 100, "motion": "high", "brightness": "bright"}
  ],
  "highlights": [{"start": 60, "end": 90, "reason": "jump"}],
  "recommended_style": "vlog"
}"#;

pub const SCENARIO_PLAN: &str = r#"{"operations": [
  {"type": "cut", "source_start": 0, "source_end": 30},
  {"type": "cut", "source_start": 60, "source_end": 90},
  {"type": "text", "text": "Hi", "start": 2, "end": 5}
]}"#;
