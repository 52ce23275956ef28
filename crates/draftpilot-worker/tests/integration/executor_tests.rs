//! Plan executor behavior against a scripted draft server.

use std::sync::atomic::Ordering;
use std::time::Duration;

use draftpilot_draft::{DraftError, Endpoint};
use draftpilot_models::{EditingPlan, OperationStatus};
use draftpilot_worker::cancel::{self, CancellationSignal};
use draftpilot_worker::{DraftLocks, ExecutorConfig, PipelineError, PlanExecutor};

use super::support::*;

#[tokio::test]
async fn cuts_are_sent_in_plan_order_one_at_a_time() {
    let transport = ScriptedTransport::new();
    transport.set_delay(Duration::from_millis(2));
    let plan = EditingPlan::new(vec![
        cut(40.0, 50.0),
        cut(0.0, 10.0),
        cut(100.0, 110.0),
        cut(20.0, 25.0),
    ]);

    let report = executor(transport.clone(), 4)
        .execute(&plan, &ctx("order"), &CancellationSignal::never())
        .await
        .unwrap();

    let cut_calls: Vec<_> = transport
        .calls()
        .into_iter()
        .filter(|c| c.endpoint == Endpoint::AddVideo)
        .collect();
    let starts: Vec<f64> = cut_calls.iter().map(Call::start).collect();
    let targets: Vec<f64> = cut_calls
        .iter()
        .map(|c| c.body["target_start"].as_f64().unwrap())
        .collect();

    assert_eq!(starts, vec![40.0, 0.0, 100.0, 20.0]);
    assert_eq!(targets, vec![0.0, 10.0, 20.0, 30.0]);
    assert!(!transport.cut_overlap.load(Ordering::SeqCst));
    assert_eq!(transport.endpoints().last(), Some(&Endpoint::SaveDraft));
    assert_eq!(report.session.count(OperationStatus::Acknowledged), 4);
}

#[tokio::test]
async fn scenario_plan_produces_expected_calls() {
    let transport = ScriptedTransport::new();

    let report = executor(transport.clone(), 4)
        .execute(&scenario_plan(), &ctx("scenario"), &CancellationSignal::never())
        .await
        .unwrap();

    let calls = transport.calls();
    assert_eq!(
        transport.endpoints(),
        vec![
            Endpoint::AddVideo,
            Endpoint::AddVideo,
            Endpoint::AddText,
            Endpoint::SaveDraft
        ]
    );
    assert_eq!(calls[0].body["start"], 0.0);
    assert_eq!(calls[0].body["end"], 30.0);
    assert_eq!(calls[0].body["target_start"], 0.0);
    assert_eq!(calls[1].body["start"], 60.0);
    assert_eq!(calls[1].body["end"], 90.0);
    assert_eq!(calls[1].body["target_start"], 30.0);
    assert_eq!(calls[2].body["text"], "Hi");
    assert_eq!(calls[3].body["draft_id"], "scenario");

    assert_eq!(report.draft_path, "/drafts/scenario");
    assert!(report.warnings.is_empty());
    assert!(report.session.is_terminal());
}

#[tokio::test]
async fn rejected_cut_skips_save_but_delivers_overlays() {
    let transport = ScriptedTransport::new();
    transport.reject_start(Endpoint::AddVideo, 60.0);

    let err = executor(transport.clone(), 4)
        .execute(&scenario_plan(), &ctx("rejected"), &CancellationSignal::never())
        .await
        .unwrap_err();

    let PipelineError::PlanExecutionFailed(failure) = err else {
        panic!("expected PlanExecutionFailed, got {err:?}");
    };
    assert_eq!(failure.failed_cut_count(), 1);
    assert_eq!(failure.failed[0].index, 1);
    assert!(failure.save_failure.is_none());
    assert!(failure.session.save.is_none());

    // Rejections are not retried.
    assert_eq!(transport.count(Endpoint::AddVideo), 2);
    assert_eq!(transport.count(Endpoint::AddText), 1);
    assert_eq!(transport.count(Endpoint::SaveDraft), 0);
    assert_eq!(
        failure.session.record(2).map(|r| r.status),
        Some(OperationStatus::Acknowledged)
    );
}

#[tokio::test]
async fn transient_server_errors_are_retried_up_to_the_budget() {
    for failures in 0..=4u32 {
        let transport = ScriptedTransport::new();
        transport.fail(
            Endpoint::AddVideo,
            (0..failures)
                .map(|_| DraftError::server_error(503, "busy"))
                .collect(),
        );
        let plan = EditingPlan::new(vec![cut(0.0, 10.0)]);

        let result = executor(transport.clone(), 4)
            .execute(&plan, &ctx("retry"), &CancellationSignal::never())
            .await;

        let expected_calls = (failures + 1).min(3) as usize;
        assert_eq!(
            transport.count(Endpoint::AddVideo),
            expected_calls,
            "{failures} scripted failure(s)"
        );
        if failures < 3 {
            let report = result.unwrap();
            let record = report.session.record(0).unwrap();
            assert_eq!(record.status, OperationStatus::Acknowledged);
            assert_eq!(record.attempts, failures + 1);
            assert_eq!(transport.count(Endpoint::SaveDraft), 1);
        } else {
            assert!(matches!(result, Err(PipelineError::PlanExecutionFailed(_))));
            assert_eq!(transport.count(Endpoint::SaveDraft), 0);
        }
    }
}

#[tokio::test]
async fn failed_overlay_becomes_a_warning() {
    let transport = ScriptedTransport::new();
    transport.fail(
        Endpoint::AddText,
        vec![DraftError::rejected(Some(400), "bad font")],
    );

    let report = executor(transport.clone(), 4)
        .execute(&scenario_plan(), &ctx("warn"), &CancellationSignal::never())
        .await
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("operation 2"));
    assert_eq!(transport.count(Endpoint::SaveDraft), 1);
}

#[tokio::test]
async fn cancel_after_first_cut_stops_new_calls() {
    let transport = ScriptedTransport::new();
    let (handle, signal) = cancel::pair();
    transport.cancel_after_first_cut(handle);
    let plan = EditingPlan::new(vec![
        cut(0.0, 10.0),
        cut(20.0, 30.0),
        cut(40.0, 50.0),
        text("late", 1.0, 2.0),
    ]);

    let err = executor(transport.clone(), 4)
        .execute(&plan, &ctx("cancel"), &signal)
        .await
        .unwrap_err();

    let PipelineError::Cancelled(session) = err else {
        panic!("expected Cancelled, got {err:?}");
    };
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(session.count(OperationStatus::Acknowledged), 1);
    assert_eq!(session.count(OperationStatus::Pending), 3);
    assert!(session.save.is_none());
}

#[tokio::test]
async fn executors_sharing_locks_do_not_interleave_cuts_on_one_draft() {
    let transport = ScriptedTransport::new();
    transport.set_delay(Duration::from_millis(3));
    let locks = DraftLocks::new();
    let config = ExecutorConfig::default();
    let first = PlanExecutor::new(client(transport.clone(), 3), &config).with_locks(locks.clone());
    let second = PlanExecutor::new(client(transport.clone(), 3), &config).with_locks(locks);

    let plan_a = EditingPlan::new(vec![cut(0.0, 10.0), cut(10.0, 20.0)]);
    let plan_b = EditingPlan::new(vec![cut(50.0, 60.0), cut(60.0, 70.0)]);
    let context = ctx("shared");
    let never = CancellationSignal::never();

    let (a, b) = tokio::join!(
        first.execute(&plan_a, &context, &never),
        second.execute(&plan_b, &context, &never),
    );
    a.unwrap();
    b.unwrap();

    assert!(!transport.cut_overlap.load(Ordering::SeqCst));
    let starts: Vec<f64> = transport
        .calls()
        .iter()
        .filter(|c| c.endpoint == Endpoint::AddVideo)
        .map(Call::start)
        .collect();
    assert!(
        starts == vec![0.0, 10.0, 50.0, 60.0] || starts == vec![50.0, 60.0, 0.0, 10.0],
        "cuts interleaved: {starts:?}"
    );
}

#[tokio::test]
async fn overlay_fan_out_respects_the_bound() {
    let transport = ScriptedTransport::new();
    transport.set_delay(Duration::from_millis(5));
    let mut operations = vec![cut(0.0, 60.0)];
    operations.extend((0..8).map(|i| text(&format!("t{i}"), i as f64, i as f64 + 1.0)));
    let plan = EditingPlan::new(operations);

    executor(transport.clone(), 2)
        .execute(&plan, &ctx("fanout"), &CancellationSignal::never())
        .await
        .unwrap();

    let peak = transport.max_overlay_in_flight.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak overlay concurrency {peak}");
    assert_eq!(transport.count(Endpoint::AddText), 8);
}

#[tokio::test]
async fn out_of_range_effect_anchor_sends_nothing() {
    let transport = ScriptedTransport::new();
    let raw = r#"{"operations": [
        {"type": "cut", "source_start": 0, "source_end": 10},
        {"type": "effect", "effect_type": "video", "effect_name": "flash", "anchor": 3, "offset": 0, "duration": 1}
    ]}"#;
    let plan = EditingPlan::from_json(raw).unwrap();

    let err = executor(transport.clone(), 4)
        .execute(&plan, &ctx("anchor"), &CancellationSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::PlanInvalid(_)));
    assert!(transport.calls().is_empty());
}
