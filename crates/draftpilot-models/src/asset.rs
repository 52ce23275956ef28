//! Source video asset models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Brightness class of sampled frames (mean luma, 0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BrightnessLevel {
    Dark,
    Normal,
    Bright,
}

impl BrightnessLevel {
    /// Classify a mean luma value.
    pub fn classify(mean_luma: f64) -> Self {
        if mean_luma < 80.0 {
            BrightnessLevel::Dark
        } else if mean_luma < 180.0 {
            BrightnessLevel::Normal
        } else {
            BrightnessLevel::Bright
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrightnessLevel::Dark => "dark",
            BrightnessLevel::Normal => "normal",
            BrightnessLevel::Bright => "bright",
        }
    }
}

impl fmt::Display for BrightnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Motion class of sampled frames (mean inter-frame luma difference).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MotionLevel {
    Static,
    Moderate,
    High,
}

impl MotionLevel {
    /// Classify a mean frame difference value.
    pub fn classify(mean_difference: f64) -> Self {
        if mean_difference < 10.0 {
            MotionLevel::Static
        } else if mean_difference < 30.0 {
            MotionLevel::Moderate
        } else {
            MotionLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MotionLevel::Static => "static",
            MotionLevel::Moderate => "moderate",
            MotionLevel::High => "high",
        }
    }
}

impl fmt::Display for MotionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse signals sampled locally from the source before analysis.
///
/// Every field is optional: sampling is best effort and an empty set of
/// signals is a valid input to analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SampledSignals {
    /// Scene-change timestamps in seconds, ascending
    #[serde(default)]
    pub scene_changes: Vec<f64>,

    /// Mean luma across sampled frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_brightness: Option<f64>,

    /// Mean inter-frame luma difference across sampled frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_motion: Option<f64>,
}

impl SampledSignals {
    pub fn is_empty(&self) -> bool {
        self.scene_changes.is_empty()
            && self.average_brightness.is_none()
            && self.average_motion.is_none()
    }

    pub fn brightness_level(&self) -> Option<BrightnessLevel> {
        self.average_brightness.map(BrightnessLevel::classify)
    }

    pub fn motion_level(&self) -> Option<MotionLevel> {
        self.average_motion.map(MotionLevel::classify)
    }
}

/// Immutable description of a source video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoAsset {
    /// Path to the source file (also its identifier)
    pub path: PathBuf,

    /// Duration in seconds
    pub duration: f64,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Frame rate (fps)
    pub fps: f64,

    /// Video codec name
    pub codec: String,

    /// Container format name
    pub container: String,

    /// File size in bytes
    pub size_bytes: u64,

    /// Whether an audio stream is present
    #[serde(default)]
    pub has_audio: bool,

    /// Locally sampled coarse signals
    #[serde(default)]
    pub signals: SampledSignals,
}

impl VideoAsset {
    /// Create an asset with no sampled signals.
    pub fn new(path: impl AsRef<Path>, duration: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            duration,
            width,
            height,
            fps: 30.0,
            codec: String::new(),
            container: String::new(),
            size_bytes: 0,
            has_audio: false,
            signals: SampledSignals::default(),
        }
    }

    /// Attach sampled signals.
    pub fn with_signals(mut self, signals: SampledSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Source reference sent to the draft server.
    pub fn source_url(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// File stem, used when naming drafts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "draft".to_string())
    }

    /// Human-readable aspect label ("16:9", "9:16", "1:1", "4:3" or raw WxH).
    pub fn aspect_label(&self) -> String {
        if self.height == 0 {
            return format!("{}:{}", self.width, self.height);
        }
        let ratio = self.width as f64 / self.height as f64;
        let known = [(16.0 / 9.0, "16:9"), (9.0 / 16.0, "9:16"), (1.0, "1:1"), (4.0 / 3.0, "4:3")];
        known
            .iter()
            .find(|(value, _)| (ratio - value).abs() < 0.1)
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.width, self.height))
    }
}
