//! FFprobe ingestion into `VideoAsset`.

use draftpilot_models::VideoAsset;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::signals::{sample_signals, SamplingOptions};
use crate::tools::MediaTools;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a source file and describe it as a `VideoAsset` without signals.
pub async fn probe_asset(tools: &MediaTools, path: impl AsRef<Path>) -> MediaResult<VideoAsset> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe exited with {}", output.status),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let asset = asset_from_probe_json(path, &output.stdout)?;
    debug!(
        path = %path.display(),
        duration = asset.duration,
        width = asset.width,
        height = asset.height,
        "Probed source"
    );
    Ok(asset)
}

/// Probe a source and attach sampled signals.
///
/// Sampling is best effort: a failure is logged and yields empty signals.
pub async fn ingest(
    tools: &MediaTools,
    path: impl AsRef<Path>,
    options: &SamplingOptions,
) -> MediaResult<VideoAsset> {
    let path = path.as_ref();
    let asset = probe_asset(tools, path).await?;

    let signals = match sample_signals(tools, path, asset.duration, options).await {
        Ok(signals) => signals,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Signal sampling failed, continuing without signals");
            Default::default()
        }
    };

    info!(
        path = %path.display(),
        duration = asset.duration,
        resolution = %format!("{}x{}", asset.width, asset.height),
        aspect = %asset.aspect_label(),
        scene_changes = signals.scene_changes.len(),
        "Ingested source"
    );

    Ok(asset.with_signals(signals))
}

fn asset_from_probe_json(path: &Path, raw: &[u8]) -> MediaResult<VideoAsset> {
    let probe: FfprobeOutput = serde_json::from_slice(raw)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| MediaError::invalid_video("Missing or zero duration"))?;

    let size_bytes = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| video_stream.r_frame_rate.as_ref().and_then(|r| parse_frame_rate(r)))
        .unwrap_or(30.0);

    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let mut asset = VideoAsset::new(
        path,
        duration,
        video_stream.width.unwrap_or(0),
        video_stream.height.unwrap_or(0),
    );
    asset.fps = fps;
    asset.codec = video_stream.codec_name.clone().unwrap_or_default();
    asset.container = probe.format.format_name.clone().unwrap_or_default();
    asset.size_bytes = size_bytes;
    asset.has_audio = has_audio;
    Ok(asset)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
