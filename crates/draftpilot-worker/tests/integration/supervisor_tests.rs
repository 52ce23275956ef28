//! Server supervision lifecycle.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use draftpilot_worker::{PipelineError, ServerStatus, ServerSupervisor};

use super::support::*;

async fn wait_for_unavailable(supervisor: &ServerSupervisor) {
    let mut status = supervisor.status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| matches!(s, ServerStatus::Unavailable(_))),
    )
    .await
    .expect("supervisor never gave up")
    .expect("status channel closed");
}

#[tokio::test]
async fn adopted_server_is_left_running() {
    let launcher = Arc::new(FakeLauncher::default());
    let supervisor = ServerSupervisor::with_components(
        fast_supervisor_config(),
        ScriptedProbe::new(vec![], true),
        launcher.clone(),
    );

    let lease = supervisor.acquire().await.unwrap();
    assert!(lease.handle().adopted);
    assert_eq!(lease.handle().pid, None);
    lease.release().await;

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    assert_eq!(launcher.terminated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn launched_server_stops_when_the_last_lease_is_released() {
    let launcher = Arc::new(FakeLauncher::default());
    let supervisor = ServerSupervisor::with_components(
        fast_supervisor_config(),
        ScriptedProbe::new(vec![false, false, true], true),
        launcher.clone(),
    );

    let first = supervisor.acquire().await.unwrap();
    let second = supervisor.acquire().await.unwrap();
    assert!(!first.handle().adopted);
    assert_eq!(first.handle().pid, second.handle().pid);

    first.release().await;
    assert_eq!(launcher.terminated.load(Ordering::SeqCst), 0);
    second.release().await;

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_health_checks_restart_at_most_once() {
    let launcher = Arc::new(FakeLauncher::default());
    let supervisor = ServerSupervisor::with_components(
        fast_supervisor_config(),
        ScriptedProbe::new(vec![false, true], false),
        launcher.clone(),
    );

    let lease = supervisor.acquire().await.unwrap();
    wait_for_unavailable(&supervisor).await;

    assert_eq!(supervisor.restart_count(), 1);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);

    let err = supervisor.acquire().await.unwrap_err();
    assert!(matches!(err, PipelineError::ServerUnavailable(_)));

    lease.release().await;
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn server_that_never_answers_is_unavailable() {
    let launcher = Arc::new(FakeLauncher::default());
    let supervisor = ServerSupervisor::with_components(
        fast_supervisor_config(),
        ScriptedProbe::new(vec![], false),
        launcher.clone(),
    );

    let err = supervisor.acquire().await.unwrap_err();

    assert!(matches!(err, PipelineError::ServerUnavailable(_)));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.terminated.load(Ordering::SeqCst), 1);
}
