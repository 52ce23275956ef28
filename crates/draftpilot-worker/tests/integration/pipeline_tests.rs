//! Full runs: supervision, analysis, planning and execution together.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use draftpilot_ai::{ContentAnalyzer, LanguageModel, PlanGenerator};
use draftpilot_draft::{DraftClient, DraftClientConfig, Endpoint};
use draftpilot_models::{DraftId, OperationStatus, StyleConfig, VideoAsset};
use draftpilot_worker::cancel::CancellationSignal;
use draftpilot_worker::{
    BatchRunner, ExecutorConfig, Orchestrator, PipelineError, PlanExecutor, ServerSupervisor,
    SupervisorConfig,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::support::*;

fn orchestrator(
    model: Arc<dyn LanguageModel>,
    supervisor: ServerSupervisor,
    client: DraftClient,
) -> Orchestrator {
    Orchestrator::new(
        supervisor,
        ContentAnalyzer::new(model.clone()),
        PlanGenerator::new(model),
        PlanExecutor::new(client, &ExecutorConfig::default()),
        "./drafts",
    )
}

fn adopting_supervisor(config: SupervisorConfig) -> (ServerSupervisor, Arc<FakeLauncher>) {
    let launcher = Arc::new(FakeLauncher::default());
    let supervisor =
        ServerSupervisor::with_components(config, ScriptedProbe::new(vec![], true), launcher.clone());
    (supervisor, launcher)
}

#[tokio::test]
async fn end_to_end_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/add_video"))
        .and(body_partial_json(
            json!({"video_url": "/in/trip.mp4", "draft_id": "trip_e2e"}),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "output": {"material_id": "v"}})),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/add_text"))
        .and(body_partial_json(json!({"text": "Hi", "draft_id": "trip_e2e"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/save_draft"))
        .and(body_partial_json(json!({"draft_id": "trip_e2e"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "output": {"draft_path": "/drafts/trip_e2e"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DraftClient::new(DraftClientConfig {
        base_url: server.uri(),
        backoff: Duration::from_millis(1),
        ..DraftClientConfig::default()
    })
    .unwrap();
    let (supervisor, launcher) = adopting_supervisor(fast_supervisor_config());
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(CannedModel::new(ANALYSIS, SCENARIO_PLAN), supervisor, client)
        .with_session_log_dir(dir.path());

    let result = orch
        .run_named(
            &asset(120.0),
            &StyleConfig::new("vlog"),
            DraftId::from("trip_e2e"),
            CancellationSignal::never(),
        )
        .await
        .unwrap();

    assert_eq!(result.draft_path, "/drafts/trip_e2e");
    assert!(result.warnings.is_empty());
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    assert!(dir.path().join("trip_e2e.json").exists());

    let paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(paths, vec!["/add_video", "/add_video", "/add_text", "/save_draft"]);
}

#[tokio::test]
async fn server_lost_mid_execution_keeps_the_partial_session() {
    let transport = ScriptedTransport::new();
    transport.set_delay(Duration::from_millis(40));
    let plan = r#"{"operations": [
        {"type": "cut", "source_start": 0, "source_end": 10},
        {"type": "cut", "source_start": 10, "source_end": 20},
        {"type": "cut", "source_start": 20, "source_end": 30},
        {"type": "cut", "source_start": 30, "source_end": 40},
        {"type": "cut", "source_start": 40, "source_end": 50}
    ]}"#;
    let config = SupervisorConfig {
        max_restarts: 0,
        ..fast_supervisor_config()
    };
    let launcher = Arc::new(FakeLauncher::default());
    let supervisor = ServerSupervisor::with_components(
        config,
        ScriptedProbe::new(vec![true], false),
        launcher.clone(),
    );
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        CannedModel::new(ANALYSIS, plan),
        supervisor,
        client(transport.clone(), 3),
    )
    .with_session_log_dir(dir.path());

    let err = orch
        .run_named(
            &asset(120.0),
            &StyleConfig::new("vlog"),
            DraftId::from("lost_server"),
            CancellationSignal::never(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::ServerLost { .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.kind(), "server_unavailable");
    let session = err.session().expect("server loss keeps the session");
    assert_eq!(
        session.count(OperationStatus::Acknowledged),
        transport.count(Endpoint::AddVideo)
    );
    assert!(session.count(OperationStatus::Pending) > 0);
    assert!(session.save.is_none());
    assert!(dir.path().join("lost_server.json").exists());

    assert!(transport.count(Endpoint::AddVideo) < 5);
    assert_eq!(transport.count(Endpoint::SaveDraft), 0);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn plan_outside_source_never_reaches_the_server() {
    let transport = ScriptedTransport::new();
    let (supervisor, launcher) = adopting_supervisor(fast_supervisor_config());
    let analysis = r#"{"content_type": "clip", "scenes": [{"start": 0, "end": 50, "motion": "static", "brightness": "dark"}]}"#;
    let orch = orchestrator(
        CannedModel::new(analysis, SCENARIO_PLAN),
        supervisor,
        client(transport.clone(), 3),
    );

    // 60..90 runs past a 50 second source.
    let short = VideoAsset::new("/in/short.mp4", 50.0, 1920, 1080);
    let err = orch
        .run(&short, &StyleConfig::new("vlog"), CancellationSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::PlanInvalid(_)));
    assert!(transport.calls().is_empty());
    assert_eq!(launcher.terminated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_failures() {
    let transport = ScriptedTransport::new();
    let (supervisor, _launcher) = adopting_supervisor(fast_supervisor_config());
    let analysis = r#"{"content_type": "clip", "scenes": [{"start": 0, "end": 40, "motion": "moderate", "brightness": "normal"}]}"#;
    let orch = Arc::new(orchestrator(
        CannedModel::new(analysis, SCENARIO_PLAN),
        supervisor,
        client(transport.clone(), 3),
    ));

    let assets = vec![
        VideoAsset::new("/in/long.mp4", 120.0, 1920, 1080),
        VideoAsset::new("/in/short.mp4", 50.0, 1920, 1080),
        VideoAsset::new("/in/other.mp4", 100.0, 1280, 720),
    ];
    let outcomes = BatchRunner::new(orch, 2)
        .run(assets, &StyleConfig::new("vlog"), CancellationSignal::never())
        .await;

    let names: Vec<_> = outcomes
        .iter()
        .map(|o| o.path.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["/in/long.mp4", "/in/short.mp4", "/in/other.mp4"]);
    assert!(outcomes[0].is_success());
    assert!(matches!(
        outcomes[1].result,
        Err(PipelineError::PlanInvalid(_))
    ));
    assert!(outcomes[2].is_success());
    assert_eq!(transport.count(Endpoint::SaveDraft), 2);
}
