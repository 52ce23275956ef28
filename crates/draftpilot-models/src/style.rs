//! Editing style presets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Landscape (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Portrait (9:16) for short-form social feeds
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Classic (4:3)
    pub const CLASSIC: AspectRatio = AspectRatio {
        width: 4,
        height: 3,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a decimal.
    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))?;

        let width = w
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(w.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(h.to_string()))?;

        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = AspectRatioParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(value: AspectRatio) -> Self {
        value.to_string()
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::LANDSCAPE
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
}

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "720p")]
    Hd,
    #[default]
    #[serde(rename = "1080p")]
    FullHd,
    #[serde(rename = "4k")]
    Uhd,
}

impl Quality {
    /// Frame height for this tier.
    pub fn base_height(&self) -> u32 {
        match self {
            Quality::Hd => 720,
            Quality::FullHd => 1080,
            Quality::Uhd => 2160,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Hd => "720p",
            Quality::FullHd => "1080p",
            Quality::Uhd => "4k",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Quality {
    type Err = StyleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "720p" => Ok(Quality::Hd),
            "1080p" => Ok(Quality::FullHd),
            "4k" | "2160p" => Ok(Quality::Uhd),
            _ => Err(StyleParseError(format!("quality '{s}'"))),
        }
    }
}

/// Editing rhythm the plan should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    FastPaced,
    #[default]
    Dynamic,
    Clean,
    Casual,
}

impl Pacing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pacing::FastPaced => "fast_paced",
            Pacing::Dynamic => "dynamic",
            Pacing::Clean => "clean",
            Pacing::Casual => "casual",
        }
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the plan should carry subtitle cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPolicy {
    #[default]
    Off,
    Subtitles,
}

#[derive(Debug, Error)]
#[error("Unknown {0}")]
pub struct StyleParseError(String);

/// Named editing preset. Read-only input to plan generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Preset name
    pub name: String,

    /// Desired output length in seconds; derived from the source when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<f64>,

    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default)]
    pub quality: Quality,

    #[serde(default)]
    pub pacing: Pacing,

    #[serde(default)]
    pub caption_policy: CaptionPolicy,

    /// Whether a music bed should be added
    #[serde(default)]
    pub add_music: bool,

    /// Music file to use when `add_music` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_track: Option<String>,

    /// Music volume in [0, 1]
    #[serde(default = "default_music_volume")]
    pub music_volume: f64,
}

fn default_music_volume() -> f64 {
    0.3
}

impl StyleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_duration: None,
            aspect_ratio: AspectRatio::default(),
            quality: Quality::default(),
            pacing: Pacing::default(),
            caption_policy: CaptionPolicy::default(),
            add_music: false,
            music_track: None,
            music_volume: default_music_volume(),
        }
    }

    pub fn with_target_duration(mut self, seconds: f64) -> Self {
        self.target_duration = Some(seconds);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Output frame size for this style.
    ///
    /// The height is fixed by the quality tier; the width follows the aspect
    /// ratio, truncated to whole pixels.
    pub fn resolution(&self) -> (u32, u32) {
        let height = self.quality.base_height();
        let width = (height as u64 * self.aspect_ratio.width as u64
            / self.aspect_ratio.height as u64) as u32;
        (width, height)
    }

    /// Output length for a source of `source_duration` seconds.
    pub fn target_duration_for(&self, source_duration: f64) -> f64 {
        match self.target_duration {
            Some(target) => target.min(source_duration),
            None => source_duration * 0.8,
        }
    }

    pub fn wants_captions(&self) -> bool {
        self.caption_policy == CaptionPolicy::Subtitles
    }

    /// Music file name looked up for this style when no track is set.
    pub fn music_file_name(&self) -> &'static str {
        match self.name.as_str() {
            "social_media" => "upbeat_short.mp3",
            "highlight_reel" => "energetic_sports.mp3",
            "tutorial" => "calm_background.mp3",
            "vlog" => "casual_ambient.mp3",
            _ => DEFAULT_MUSIC_FILE,
        }
    }

    /// Fill `music_track` from `music_dir` when music is wanted but no
    /// track is configured. Missing files leave the style without music.
    pub fn with_music_from(mut self, music_dir: &Path) -> Self {
        if self.add_music && self.music_track.is_none() {
            let candidate = music_dir.join(self.music_file_name());
            if candidate.is_file() {
                self.music_track = Some(candidate.to_string_lossy().into_owned());
            }
        }
        self
    }
}

/// Music file used by styles without a dedicated track.
pub const DEFAULT_MUSIC_FILE: &str = "default.mp3";

/// Errors loading a presets file.
#[derive(Debug, Error)]
pub enum PresetLoadError {
    #[error("failed to read presets file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid presets file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Registry of named style presets.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePresets {
    presets: BTreeMap<String, StyleConfig>,
}

impl StylePresets {
    /// Name of the preset used when none is requested.
    pub const DEFAULT: &'static str = "social_media";

    /// The four built-in presets.
    pub fn builtin() -> Self {
        let social_media = StyleConfig {
            target_duration: Some(60.0),
            aspect_ratio: AspectRatio::PORTRAIT,
            pacing: Pacing::FastPaced,
            caption_policy: CaptionPolicy::Subtitles,
            add_music: true,
            music_volume: 0.3,
            ..StyleConfig::new("social_media")
        };
        let highlight_reel = StyleConfig {
            target_duration: Some(90.0),
            aspect_ratio: AspectRatio::LANDSCAPE,
            pacing: Pacing::Dynamic,
            caption_policy: CaptionPolicy::Off,
            add_music: true,
            music_volume: 0.5,
            ..StyleConfig::new("highlight_reel")
        };
        let tutorial = StyleConfig {
            target_duration: Some(300.0),
            aspect_ratio: AspectRatio::LANDSCAPE,
            pacing: Pacing::Clean,
            caption_policy: CaptionPolicy::Subtitles,
            add_music: true,
            music_volume: 0.1,
            ..StyleConfig::new("tutorial")
        };
        let vlog = StyleConfig {
            target_duration: Some(180.0),
            aspect_ratio: AspectRatio::LANDSCAPE,
            pacing: Pacing::Casual,
            caption_policy: CaptionPolicy::Subtitles,
            add_music: true,
            music_volume: 0.2,
            ..StyleConfig::new("vlog")
        };

        let presets = [social_media, highlight_reel, tutorial, vlog]
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { presets }
    }

    /// Built-ins overridden (and extended) by a JSON object of name -> preset.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PresetLoadError> {
        let raw = std::fs::read_to_string(path)?;
        let overrides: BTreeMap<String, StyleConfig> = serde_json::from_str(&raw)?;

        let mut registry = Self::builtin();
        for (name, mut preset) in overrides {
            preset.name = name.clone();
            registry.presets.insert(name, preset);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&StyleConfig> {
        self.presets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleConfig> {
        self.presets.values()
    }
}

impl Default for StylePresets {
    fn default() -> Self {
        Self::builtin()
    }
}
