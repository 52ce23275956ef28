//! draftpilot command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use draftpilot_ai::AnthropicClient;
use draftpilot_draft::DraftClient;
use draftpilot_media::{ingest, MediaTools, SamplingOptions};
use draftpilot_models::{DraftId, StyleConfig, StylePresets, VideoAsset};
use draftpilot_worker::cancel::{self, CancellationSignal};
use draftpilot_worker::{BatchRunner, Orchestrator, PipelineConfig, PipelineError, ServerSupervisor};

#[derive(Parser)]
#[command(name = "draftpilot", version, about = "Turn raw footage into an editable draft")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one video and build a draft from it
    Edit {
        video: PathBuf,
        /// Style preset name
        #[arg(long, default_value = StylePresets::DEFAULT)]
        style: String,
        /// Draft name (defaults to <stem>_<timestamp>)
        #[arg(long)]
        name: Option<String>,
        /// Skip FFmpeg signal sampling
        #[arg(long)]
        no_signals: bool,
    },
    /// Build one draft per video
    Batch {
        #[arg(required = true)]
        videos: Vec<PathBuf>,
        #[arg(long, default_value = StylePresets::DEFAULT)]
        style: String,
        /// Videos processed concurrently
        #[arg(long)]
        parallel: Option<usize>,
        #[arg(long)]
        no_signals: bool,
    },
    /// Check draft server health and endpoint availability
    Check,
    /// List style presets
    Presets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();
    let presets = load_presets(&config)?;

    match cli.command {
        Commands::Edit {
            video,
            style,
            name,
            no_signals,
        } => {
            let style = select_style(&presets, &style)?;
            let asset = ingest_one(&video, no_signals).await?;
            let orchestrator = build_orchestrator(&config)?;
            let draft_id = name
                .map(DraftId::from)
                .unwrap_or_else(|| DraftId::generate(&asset.stem()));

            match orchestrator
                .run_named(&asset, &style, draft_id, cancel_on_ctrl_c())
                .await
            {
                Ok(result) => {
                    println!("Draft {} saved to {}", result.draft_id, result.draft_path);
                    for warning in &result.warnings {
                        println!("  warning: {warning}");
                    }
                }
                Err(e) => {
                    report_failure(&e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Batch {
            videos,
            style,
            parallel,
            no_signals,
        } => {
            let style = select_style(&presets, &style)?;
            let mut assets = Vec::with_capacity(videos.len());
            for video in &videos {
                match ingest_one(video, no_signals).await {
                    Ok(asset) => assets.push(asset),
                    Err(e) => warn!(path = %video.display(), "Skipping video: {:#}", e),
                }
            }

            let orchestrator = Arc::new(build_orchestrator(&config)?);
            let runner = BatchRunner::new(orchestrator, parallel.unwrap_or(config.parallel_jobs));
            let outcomes = runner.run(assets, &style, cancel_on_ctrl_c()).await;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(result) => println!("{}: {}", outcome.path.display(), result.draft_path),
                    Err(e) => {
                        failed += 1;
                        println!("{}: FAILED ({})", outcome.path.display(), e.kind());
                        report_failure(e);
                    }
                }
            }
            println!(
                "{} of {} videos drafted",
                outcomes.len() - failed,
                videos.len()
            );
            if failed > 0 || outcomes.len() < videos.len() {
                std::process::exit(1);
            }
        }
        Commands::Check => {
            let supervisor = ServerSupervisor::new(config.supervisor.clone());
            let lease = supervisor.acquire().await?;
            let handle = lease.handle().clone();
            println!(
                "Draft server at {} ({})",
                handle.address,
                if handle.adopted { "adopted" } else { "launched" }
            );

            let client = DraftClient::new(config.client.clone())?;
            let report = client.probe_endpoints().await;
            lease.release().await;

            for entry in &report.entries {
                let detail = match (&entry.status, &entry.error) {
                    (Some(status), _) => format!("HTTP {status}"),
                    (None, Some(error)) => error.clone(),
                    (None, None) => "no response".to_string(),
                };
                let mark = if entry.available { "ok" } else { "--" };
                println!("  [{mark}] {:<14} {detail}", entry.path);
            }
            if !report.all_available() {
                std::process::exit(1);
            }
        }
        Commands::Presets => {
            for style in presets.iter() {
                let (width, height) = style.resolution();
                let target = style
                    .target_duration
                    .map(|d| format!("{d:.0}s"))
                    .unwrap_or_else(|| "80% of source".to_string());
                println!(
                    "{:<16} {} {}x{} pacing={} target={} captions={} music={}",
                    style.name,
                    style.aspect_ratio,
                    width,
                    height,
                    style.pacing,
                    target,
                    style.wants_captions(),
                    style.add_music
                );
            }
        }
    }

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("draftpilot=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

fn load_presets(config: &PipelineConfig) -> anyhow::Result<StylePresets> {
    match &config.presets_file {
        Some(path) => StylePresets::from_file(path)
            .with_context(|| format!("loading presets from {}", path.display())),
        None => Ok(StylePresets::builtin()),
    }
}

fn select_style(presets: &StylePresets, name: &str) -> anyhow::Result<StyleConfig> {
    presets.get(name).cloned().with_context(|| {
        let known: Vec<&str> = presets.names().collect();
        format!("unknown style '{name}' (available: {})", known.join(", "))
    })
}

async fn ingest_one(video: &Path, no_signals: bool) -> anyhow::Result<VideoAsset> {
    let tools = MediaTools::from_env()?;
    let options = SamplingOptions {
        enabled: !no_signals,
        ..SamplingOptions::default()
    };
    ingest(&tools, video, &options)
        .await
        .with_context(|| format!("ingesting {}", video.display()))
}

fn build_orchestrator(config: &PipelineConfig) -> anyhow::Result<Orchestrator> {
    let model = AnthropicClient::from_env()?;
    info!(model = %model.model(), "Using Anthropic provider");
    Ok(Orchestrator::from_config(config, Arc::new(model))?)
}

/// First Ctrl-C cancels the run; in-flight draft calls still complete.
fn cancel_on_ctrl_c() -> CancellationSignal {
    let (handle, signal) = cancel::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after in-flight calls");
            handle.cancel();
        }
    });
    signal
}

fn report_failure(err: &PipelineError) {
    eprintln!("error: {err}");
    if let PipelineError::PlanExecutionFailed(failure) = err {
        for record in &failure.failed {
            match &record.failure {
                Some(detail) => eprintln!("  operation {} ({}): {}", record.index, record.kind, detail),
                None => eprintln!("  operation {} ({})", record.index, record.kind),
            }
        }
    }
    if err.is_retryable() {
        eprintln!("hint: this failure is transient; re-running the same input may succeed");
    }
}
