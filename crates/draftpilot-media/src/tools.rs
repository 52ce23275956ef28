//! Location of the FFmpeg tool binaries.

use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Resolved paths to `ffprobe` and `ffmpeg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTools {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl MediaTools {
    /// Resolve binaries from `FFPROBE_PATH` / `FFMPEG_PATH`, falling back to `PATH`.
    pub fn from_env() -> MediaResult<Self> {
        let ffprobe = std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string());
        let ffmpeg = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());
        Self::resolve(&ffprobe, &ffmpeg)
    }

    /// Resolve explicit binary names or paths.
    pub fn resolve(ffprobe: &str, ffmpeg: &str) -> MediaResult<Self> {
        let ffprobe =
            which::which(ffprobe).map_err(|e| MediaError::FfprobeNotFound(format!("{ffprobe}: {e}")))?;
        let ffmpeg =
            which::which(ffmpeg).map_err(|e| MediaError::FfmpegNotFound(format!("{ffmpeg}: {e}")))?;
        Ok(Self { ffprobe, ffmpeg })
    }
}
