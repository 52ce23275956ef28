//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use draftpilot_draft::DraftClientConfig;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// Draft server supervision settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Host the server listens on
    pub host: String,
    /// Port the server listens on (exported to the child as `PORT`)
    pub port: u16,
    /// Program used to launch the server
    pub command: String,
    /// Arguments passed to `command`
    pub args: Vec<String>,
    /// Working directory for the server process
    pub working_dir: Option<PathBuf>,
    /// Startup poll backoff base
    pub poll_base: Duration,
    /// Startup poll backoff cap
    pub poll_max: Duration,
    /// Startup poll attempts before giving up
    pub poll_attempts: u32,
    /// Interval between health checks once running
    pub monitor_interval: Duration,
    /// Consecutive failed checks that trigger a restart
    pub failure_threshold: u32,
    /// Restarts allowed over the supervisor's lifetime
    pub max_restarts: u32,
    /// Time between SIGTERM and kill
    pub grace_period: Duration,
    /// Liveness probe timeout
    pub probe_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
            command: "python".to_string(),
            args: vec!["main.py".to_string()],
            working_dir: Some(PathBuf::from("capcut-mcp")),
            poll_base: Duration::from_millis(200),
            poll_max: Duration::from_secs(5),
            poll_attempts: 15,
            monitor_interval: Duration::from_secs(5),
            failure_threshold: 3,
            max_restarts: 1,
            grace_period: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

impl SupervisorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("DRAFT_SERVER_HOST").unwrap_or(defaults.host),
            port: env_parse("DRAFT_SERVER_PORT").unwrap_or(defaults.port),
            command: std::env::var("DRAFT_SERVER_CMD").unwrap_or(defaults.command),
            args: std::env::var("DRAFT_SERVER_ARGS")
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.args),
            working_dir: std::env::var("DRAFT_SERVER_DIR")
                .ok()
                .map(PathBuf::from)
                .or(defaults.working_dir),
            poll_base: env_parse("SUPERVISOR_POLL_BASE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_base),
            poll_max: env_parse("SUPERVISOR_POLL_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_max),
            poll_attempts: env_parse("SUPERVISOR_POLL_ATTEMPTS").unwrap_or(defaults.poll_attempts),
            monitor_interval: env_parse("SUPERVISOR_MONITOR_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.monitor_interval),
            failure_threshold: env_parse("SUPERVISOR_FAILURE_THRESHOLD")
                .unwrap_or(defaults.failure_threshold),
            max_restarts: env_parse("SUPERVISOR_MAX_RESTARTS").unwrap_or(defaults.max_restarts),
            grace_period: defaults.grace_period,
            probe_timeout: defaults.probe_timeout,
        }
    }

    /// `host:port` of the server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Plan execution settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Concurrent overlay calls
    pub overlay_concurrency: usize,
    /// Folder the server saves drafts into
    pub drafts_folder: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            overlay_concurrency: 4,
            drafts_folder: "./drafts".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            overlay_concurrency: env_parse("EXECUTOR_OVERLAY_CONCURRENCY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.overlay_concurrency),
            drafts_folder: std::env::var("DRAFTS_FOLDER").unwrap_or(defaults.drafts_folder),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub supervisor: SupervisorConfig,
    pub client: DraftClientConfig,
    pub executor: ExecutorConfig,
    /// Where session records are written as JSON, if anywhere
    pub session_log_dir: Option<PathBuf>,
    /// JSON file overriding the built-in style presets
    pub presets_file: Option<PathBuf>,
    /// Videos processed concurrently in batch mode
    pub parallel_jobs: usize,
    /// Directory holding per-style background music files
    pub music_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            client: DraftClientConfig::default(),
            executor: ExecutorConfig::default(),
            session_log_dir: None,
            presets_file: None,
            parallel_jobs: 2,
            music_dir: PathBuf::from("assets/music"),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            supervisor: SupervisorConfig::from_env(),
            client: DraftClientConfig::from_env(),
            executor: ExecutorConfig::from_env(),
            session_log_dir: std::env::var("SESSION_LOG_DIR").ok().map(PathBuf::from),
            presets_file: std::env::var("STYLE_PRESETS_FILE").ok().map(PathBuf::from),
            parallel_jobs: env_parse("BATCH_PARALLEL_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.parallel_jobs),
            music_dir: std::env::var("MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.music_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_supervisor_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.address(), "localhost:9000");
        assert_eq!(config.poll_base, Duration::from_millis(200));
        assert_eq!(config.poll_max, Duration::from_secs(5));
        assert_eq!(config.max_restarts, 1);
    }

    #[test]
    #[serial]
    fn test_supervisor_from_env() {
        std::env::set_var("DRAFT_SERVER_PORT", "9555");
        std::env::set_var("DRAFT_SERVER_CMD", "uv");
        std::env::set_var("DRAFT_SERVER_ARGS", "run main.py");
        std::env::set_var("SUPERVISOR_MAX_RESTARTS", "2");

        let config = SupervisorConfig::from_env();
        assert_eq!(config.port, 9555);
        assert_eq!(config.command, "uv");
        assert_eq!(config.args, vec!["run", "main.py"]);
        assert_eq!(config.max_restarts, 2);

        for key in [
            "DRAFT_SERVER_PORT",
            "DRAFT_SERVER_CMD",
            "DRAFT_SERVER_ARGS",
            "SUPERVISOR_MAX_RESTARTS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_pipeline_music_dir() {
        std::env::remove_var("MUSIC_DIR");
        assert_eq!(PipelineConfig::from_env().music_dir, PathBuf::from("assets/music"));
        std::env::set_var("MUSIC_DIR", "/srv/music");
        assert_eq!(PipelineConfig::from_env().music_dir, PathBuf::from("/srv/music"));
        std::env::remove_var("MUSIC_DIR");
    }

    #[test]
    #[serial]
    fn test_executor_from_env_rejects_zero_concurrency() {
        std::env::set_var("EXECUTOR_OVERLAY_CONCURRENCY", "0");
        assert_eq!(ExecutorConfig::from_env().overlay_concurrency, 4);
        std::env::set_var("EXECUTOR_OVERLAY_CONCURRENCY", "8");
        assert_eq!(ExecutorConfig::from_env().overlay_concurrency, 8);
        std::env::remove_var("EXECUTOR_OVERLAY_CONCURRENCY");
    }
}
