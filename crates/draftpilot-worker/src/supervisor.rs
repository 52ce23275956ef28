//! Draft server process supervision.
//!
//! The supervisor owns the local draft server for the lifetime of one or more
//! pipeline runs. It:
//! - adopts an already-listening server, or launches one and polls it healthy
//!   with capped exponential backoff
//! - monitors health in the background and performs a bounded number of
//!   restarts, publishing status on a watch channel
//! - hands out leases; when the last lease is released the monitor stops and
//!   any process this supervisor launched is terminated (adopted servers are
//!   left running)

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SupervisorConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::retry::{Backoff, FailureTracker};

/// Reachability check for the server.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// TCP connect probe on host:port.
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }
}

#[async_trait]
impl LivenessProbe for TcpProbe {
    async fn check(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await,
            Ok(Ok(_))
        )
    }
}

/// A launched server process.
#[async_trait]
pub trait ServerProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Exit description if the process has already exited.
    fn try_exited(&mut self) -> Option<String>;

    /// SIGTERM, wait up to `grace`, then kill.
    async fn terminate(&mut self, grace: Duration);
}

/// Starts server processes.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, config: &SupervisorConfig) -> std::io::Result<Box<dyn ServerProcess>>;
}

/// Launches `config.command` as a child process with `PORT` set.
pub struct CommandLauncher;

impl ProcessLauncher for CommandLauncher {
    fn launch(&self, config: &SupervisorConfig) -> std::io::Result<Box<dyn ServerProcess>> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env("PORT", config.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn()?;
        debug!(pid = ?child.id(), command = %config.command, "Spawned draft server");
        Ok(Box::new(ChildProcess { child }))
    }
}

struct ChildProcess {
    child: Child,
}

#[async_trait]
impl ServerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exited(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            Ok(None) => None,
            Err(e) => Some(e.to_string()),
        }
    }

    async fn terminate(&mut self, grace: Duration) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!(pid, "SIGTERM failed: {}", e);
            }
        }
        #[cfg(not(unix))]
        let _ = self.child.start_kill();

        if tokio::time::timeout(grace, self.child.wait()).await.is_err() {
            warn!(pid = ?self.child.id(), "Draft server ignored SIGTERM, killing");
            if let Err(e) = self.child.kill().await {
                warn!("Failed to kill draft server: {}", e);
            }
        }
    }
}

/// Last-observed server health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerHealth {
    Healthy,
    Unhealthy,
}

/// Supervision state of the running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    /// Process id when this supervisor launched the server
    pub pid: Option<u32>,
    /// Whether the server was already running and adopted
    pub adopted: bool,
    pub health: ServerHealth,
    pub restart_count: u32,
    pub address: String,
}

/// Status published by the health monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Healthy,
    Restarted { count: u32 },
    Unavailable(String),
}

#[derive(Default)]
struct State {
    process: Option<Box<dyn ServerProcess>>,
    handle: Option<ServerHandle>,
    leases: usize,
    monitor: Option<JoinHandle<()>>,
}

struct Inner {
    config: SupervisorConfig,
    probe: Arc<dyn LivenessProbe>,
    launcher: Arc<dyn ProcessLauncher>,
    state: Mutex<State>,
    status: watch::Sender<ServerStatus>,
    restarts: AtomicU32,
}

/// Owner of the draft server lifecycle. Clones share one server.
#[derive(Clone)]
pub struct ServerSupervisor {
    inner: Arc<Inner>,
}

impl ServerSupervisor {
    /// Supervisor using a TCP probe and the configured command.
    pub fn new(config: SupervisorConfig) -> Self {
        let probe = Arc::new(TcpProbe::new(config.address(), config.probe_timeout));
        Self::with_components(config, probe, Arc::new(CommandLauncher))
    }

    pub fn with_components(
        config: SupervisorConfig,
        probe: Arc<dyn LivenessProbe>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let (status, _) = watch::channel(ServerStatus::Healthy);
        Self {
            inner: Arc::new(Inner {
                config,
                probe,
                launcher,
                state: Mutex::new(State::default()),
                status,
                restarts: AtomicU32::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Subscribe to monitor status updates.
    pub fn status(&self) -> watch::Receiver<ServerStatus> {
        self.inner.status.subscribe()
    }

    pub fn restart_count(&self) -> u32 {
        self.inner.restarts.load(Ordering::SeqCst)
    }

    /// Make sure a healthy server is reachable, adopting or launching one.
    pub async fn ensure_running(&self) -> PipelineResult<ServerHandle> {
        self.check_available()?;
        let mut state = self.inner.state.lock().await;
        self.running_locked(&mut state).await
    }

    /// Acquire a lease, starting the server and its monitor if needed.
    ///
    /// Startup and the lease count change under one state guard, so a
    /// concurrent release of the last lease cannot stop the server between
    /// them.
    pub async fn acquire(&self) -> PipelineResult<ServerLease> {
        self.check_available()?;
        let handle = {
            let mut state = self.inner.state.lock().await;
            let handle = self.running_locked(&mut state).await?;
            state.leases += 1;
            if state.monitor.is_none() {
                state.monitor = Some(self.spawn_monitor());
            }
            handle
        };
        Ok(ServerLease {
            supervisor: self.clone(),
            handle,
            status: self.status(),
            released: false,
        })
    }

    fn check_available(&self) -> PipelineResult<()> {
        let unavailable = match &*self.inner.status.borrow() {
            ServerStatus::Unavailable(reason) => Some(reason.clone()),
            _ => None,
        };
        match unavailable {
            Some(reason) => Err(PipelineError::server_unavailable(reason)),
            None => Ok(()),
        }
    }

    async fn running_locked(&self, state: &mut State) -> PipelineResult<ServerHandle> {
        if let Some(handle) = &state.handle {
            return Ok(handle.clone());
        }
        self.start_locked(state).await
    }

    async fn release_one(&self) {
        let mut state = self.inner.state.lock().await;
        state.leases = state.leases.saturating_sub(1);
        if state.leases == 0 {
            self.shutdown_locked(&mut state).await;
        }
    }

    /// Stop monitoring and terminate any process this supervisor launched.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        self.shutdown_locked(&mut state).await;
    }

    async fn shutdown_locked(&self, state: &mut State) {
        if let Some(monitor) = state.monitor.take() {
            monitor.abort();
        }
        let adopted = state.handle.as_ref().map(|h| h.adopted).unwrap_or(false);
        state.handle = None;

        if let Some(mut process) = state.process.take() {
            info!(pid = ?process.id(), "Stopping draft server");
            process.terminate(self.inner.config.grace_period).await;
        } else if adopted {
            debug!("Leaving adopted draft server running");
        }
    }

    async fn start_locked(&self, state: &mut State) -> PipelineResult<ServerHandle> {
        let config = &self.inner.config;
        let address = config.address();

        if self.inner.probe.check().await {
            info!(address = %address, "Adopting running draft server");
            let handle = ServerHandle {
                pid: None,
                adopted: true,
                health: ServerHealth::Healthy,
                restart_count: self.restart_count(),
                address,
            };
            state.handle = Some(handle.clone());
            return Ok(handle);
        }

        info!(address = %address, command = %config.command, "Launching draft server");
        let mut process = self.inner.launcher.launch(config).map_err(|e| {
            PipelineError::server_unavailable(format!("failed to launch {}: {e}", config.command))
        })?;

        let backoff = Backoff::new(config.poll_base, config.poll_max, config.poll_attempts);
        for attempt in 0..backoff.attempts {
            if self.inner.probe.check().await {
                let handle = ServerHandle {
                    pid: process.id(),
                    adopted: false,
                    health: ServerHealth::Healthy,
                    restart_count: self.restart_count(),
                    address,
                };
                info!(pid = ?handle.pid, attempts = attempt + 1, "Draft server healthy");
                state.process = Some(process);
                state.handle = Some(handle.clone());
                return Ok(handle);
            }

            if let Some(exit) = process.try_exited() {
                return Err(PipelineError::server_unavailable(format!(
                    "draft server exited during startup: {exit}"
                )));
            }

            tokio::time::sleep(backoff.delay_for_attempt(attempt)).await;
        }

        process.terminate(config.grace_period).await;
        Err(PipelineError::server_unavailable(format!(
            "draft server not reachable at {} after {} attempts",
            address, config.poll_attempts
        )))
    }

    fn spawn_monitor(&self) -> JoinHandle<()> {
        let supervisor = self.clone();
        tokio::spawn(async move { supervisor.monitor().await })
    }

    /// Health loop. Restarts at most `max_restarts` times over the
    /// supervisor's lifetime, then publishes `Unavailable` and exits.
    async fn monitor(&self) {
        let config = &self.inner.config;
        let mut tracker = FailureTracker::new(config.failure_threshold);

        loop {
            tokio::time::sleep(config.monitor_interval).await;

            if self.inner.probe.check().await {
                tracker.record_success();
                continue;
            }

            if tracker.record_failure() {
                warn!(
                    failures = tracker.failure_count(),
                    threshold = config.failure_threshold,
                    "Draft server health check failed"
                );
            }
            if !tracker.reached(config.failure_threshold) {
                continue;
            }

            if self.restart_count() >= config.max_restarts {
                self.publish_unavailable(format!(
                    "{} consecutive health checks failed and restart budget ({}) is spent",
                    tracker.failure_count(),
                    config.max_restarts
                ))
                .await;
                return;
            }

            match self.restart().await {
                Ok(count) => {
                    self.inner.status.send_replace(ServerStatus::Restarted { count });
                    tracker.record_success();
                }
                Err(e) => {
                    self.publish_unavailable(e.to_string()).await;
                    return;
                }
            }
        }
    }

    async fn restart(&self) -> PipelineResult<u32> {
        let count = self.inner.restarts.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(restart = count, "Restarting draft server");

        let mut state = self.inner.state.lock().await;
        if let Some(mut process) = state.process.take() {
            process.terminate(self.inner.config.grace_period).await;
        }
        if let Some(handle) = state.handle.as_mut() {
            handle.health = ServerHealth::Unhealthy;
        }
        let mut handle = self.start_locked(&mut state).await?;
        handle.restart_count = count;
        state.handle = Some(handle);
        Ok(count)
    }

    async fn publish_unavailable(&self, reason: String) {
        warn!("Draft server unavailable: {}", reason);
        let mut state = self.inner.state.lock().await;
        if let Some(handle) = state.handle.as_mut() {
            handle.health = ServerHealth::Unhealthy;
        }
        self.inner
            .status
            .send_replace(ServerStatus::Unavailable(reason));
    }
}

/// Scoped use of the supervised server.
///
/// Call [`ServerLease::release`] on every exit path; dropping an unreleased
/// lease releases it from a spawned task.
pub struct ServerLease {
    supervisor: ServerSupervisor,
    handle: ServerHandle,
    status: watch::Receiver<ServerStatus>,
    released: bool,
}

impl ServerLease {
    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    /// Monitor status updates.
    pub fn status(&self) -> watch::Receiver<ServerStatus> {
        self.status.clone()
    }

    pub async fn release(mut self) {
        self.released = true;
        self.supervisor.release_one().await;
    }
}

impl std::fmt::Debug for ServerLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLease")
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for ServerLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let supervisor = self.supervisor.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { supervisor.release_one().await });
            }
            Err(_) => warn!("Server lease dropped outside a runtime; process left to kill_on_drop"),
        }
    }
}
