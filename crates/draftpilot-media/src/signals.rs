//! Coarse signal sampling through FFmpeg filters.
//!
//! Brightness and motion come from `signalstats` (mean luma `YAVG` and
//! inter-frame luma difference `YDIF`) on frames sampled at a low rate.
//! Scene changes come from the `scene` score of the `select` filter.

use draftpilot_models::SampledSignals;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::tools::MediaTools;

/// Sampling parameters.
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    /// Skip sampling entirely
    pub enabled: bool,
    /// Frames per second fed to `signalstats`
    pub sample_fps: f64,
    /// Scene score above which a frame counts as a scene change
    pub scene_threshold: f64,
    /// Upper bound on each FFmpeg invocation
    pub timeout: Duration,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_fps: 1.0,
            scene_threshold: 0.3,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Sample coarse signals from a source.
pub async fn sample_signals(
    tools: &MediaTools,
    path: &Path,
    duration: f64,
    options: &SamplingOptions,
) -> MediaResult<SampledSignals> {
    if !options.enabled {
        return Ok(SampledSignals::default());
    }

    let stats_filter = format!("fps={},signalstats,metadata=print:file=-", options.sample_fps);
    let stats = run_filter(tools, path, &stats_filter, options.timeout).await?;
    let (average_brightness, average_motion) = parse_signalstats(&stats);

    let scene_filter = format!(
        "select='gt(scene,{})',metadata=print:file=-",
        options.scene_threshold
    );
    let scenes = run_filter(tools, path, &scene_filter, options.timeout).await?;
    let scene_changes: Vec<f64> = parse_scene_times(&scenes)
        .into_iter()
        .filter(|t| *t <= duration)
        .collect();

    debug!(
        path = %path.display(),
        brightness = ?average_brightness,
        motion = ?average_motion,
        scene_changes = scene_changes.len(),
        "Sampled signals"
    );

    Ok(SampledSignals {
        scene_changes,
        average_brightness,
        average_motion,
    })
}

async fn run_filter(
    tools: &MediaTools,
    path: &Path,
    filter: &str,
    timeout: Duration,
) -> MediaResult<String> {
    let child = Command::new(&tools.ffmpeg)
        .args(["-hide_banner", "-nostats", "-loglevel", "error", "-i"])
        .arg(path)
        .args(["-vf", filter, "-an", "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, child)
        .await
        .map_err(|_| MediaError::ffmpeg_failed(format!("timed out after {timeout:?}"), None, None))??;

    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            format!("filter '{filter}' failed"),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
            output.status.code(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn metadata_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.trim()
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('='))
}

/// Mean `YAVG` and mean `YDIF` (excluding the first frame) from `metadata=print` output.
fn parse_signalstats(output: &str) -> (Option<f64>, Option<f64>) {
    let mut luma = Vec::new();
    let mut diffs = Vec::new();

    for line in output.lines() {
        if let Some(v) = metadata_value(line, "lavfi.signalstats.YAVG") {
            if let Ok(v) = v.parse::<f64>() {
                luma.push(v);
            }
        } else if let Some(v) = metadata_value(line, "lavfi.signalstats.YDIF") {
            if let Ok(v) = v.parse::<f64>() {
                diffs.push(v);
            }
        }
    }

    // The first frame has no predecessor, so its YDIF is always 0.
    if !diffs.is_empty() {
        diffs.remove(0);
    }

    (mean(&luma), mean(&diffs))
}

/// `pts_time` of every frame printed by `metadata=print`.
fn parse_scene_times(output: &str) -> Vec<f64> {
    output
        .lines()
        .filter(|line| line.starts_with("frame:"))
        .filter_map(|line| {
            line.split_whitespace()
                .find_map(|field| field.strip_prefix("pts_time:"))
                .and_then(|v| v.parse::<f64>().ok())
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
