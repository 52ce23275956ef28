//! Editing plan models and validation.
//!
//! A plan is an ordered list of tagged operations. Payloads produced by the
//! language model are parsed strictly into this closed set: unknown operation
//! types and unknown fields are rejected rather than guessed at.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Keep a range of the source on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VideoCut {
    /// Source in-point in seconds
    pub source_start: f64,
    /// Source out-point in seconds
    pub source_end: f64,
    /// Destination timeline position; appended after the previous cut when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline_start: Option<f64>,
}

impl VideoCut {
    pub fn new(source_start: f64, source_end: f64) -> Self {
        Self {
            source_start,
            source_end,
            timeline_start: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.source_end - self.source_start
    }
}

/// Text overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TextOverlay {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_font")]
    pub font: String,
    /// Hex colour, e.g. "#FFFFFF"
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Text track name
    #[serde(default = "default_text_track")]
    pub track: String,
}

fn default_font() -> String {
    "Source Han Sans".to_string()
}

fn default_font_color() -> String {
    "#FFFFFF".to_string()
}

fn default_font_size() -> f64 {
    30.0
}

fn default_text_track() -> String {
    "text_main".to_string()
}

impl TextOverlay {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            font: default_font(),
            font_color: default_font_color(),
            font_size: default_font_size(),
            track: default_text_track(),
        }
    }
}

/// Audio bed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AudioTrack {
    /// Audio file path or URL
    pub source: String,
    pub start: f64,
    pub end: f64,
    /// Volume in [0, 1]
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_volume() -> f64 {
    1.0
}

/// Subtitle cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SubtitleCue {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Effect placed relative to a cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EffectOp {
    /// Effect family, e.g. "transition" or "filter"
    pub effect_type: String,
    /// Effect name, e.g. "fade"
    pub effect_name: String,
    /// Zero-based index of the cut (counting cuts only) the effect is anchored to
    pub anchor: usize,
    /// Seconds after the anchor cut's timeline start
    #[serde(default)]
    pub offset: f64,
    /// Effect length in seconds
    pub duration: f64,
}

/// Sticker overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StickerOp {
    /// Sticker family, e.g. "emoji"
    pub sticker_type: String,
    pub content: String,
    pub start: f64,
    pub end: f64,
    #[serde(default = "default_sticker_coord")]
    pub x: f64,
    #[serde(default = "default_sticker_coord")]
    pub y: f64,
    #[serde(default = "default_sticker_track")]
    pub track: String,
}

fn default_sticker_coord() -> f64 {
    100.0
}

fn default_sticker_track() -> String {
    "sticker_main".to_string()
}

/// One editing instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditOperation {
    Cut(VideoCut),
    Text(TextOverlay),
    Audio(AudioTrack),
    Subtitle(SubtitleCue),
    Effect(EffectOp),
    Sticker(StickerOp),
}

/// Operation discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Cut,
    Text,
    Audio,
    Subtitle,
    Effect,
    Sticker,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Cut => "cut",
            OperationKind::Text => "text",
            OperationKind::Audio => "audio",
            OperationKind::Subtitle => "subtitle",
            OperationKind::Effect => "effect",
            OperationKind::Sticker => "sticker",
        }
    }

    /// Everything except cuts is delivered after the cut phase.
    pub fn is_overlay(&self) -> bool {
        !matches!(self, OperationKind::Cut)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EditOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            EditOperation::Cut(_) => OperationKind::Cut,
            EditOperation::Text(_) => OperationKind::Text,
            EditOperation::Audio(_) => OperationKind::Audio,
            EditOperation::Subtitle(_) => OperationKind::Subtitle,
            EditOperation::Effect(_) => OperationKind::Effect,
            EditOperation::Sticker(_) => OperationKind::Sticker,
        }
    }

    /// Source-time window for operations that carry one directly.
    fn window(&self) -> Option<(f64, f64)> {
        match self {
            EditOperation::Cut(c) => Some((c.source_start, c.source_end)),
            EditOperation::Text(t) => Some((t.start, t.end)),
            EditOperation::Audio(a) => Some((a.start, a.end)),
            EditOperation::Subtitle(s) => Some((s.start, s.end)),
            EditOperation::Sticker(s) => Some((s.start, s.end)),
            EditOperation::Effect(_) => None,
        }
    }

    /// Track an overlay occupies, for duplicate-window detection.
    fn track_key(&self) -> Option<String> {
        match self {
            EditOperation::Text(t) => Some(format!("text/{}", t.track)),
            EditOperation::Sticker(s) => Some(format!("sticker/{}", s.track)),
            EditOperation::Audio(_) => Some("audio".to_string()),
            EditOperation::Subtitle(_) => Some("subtitle".to_string()),
            EditOperation::Cut(_) | EditOperation::Effect(_) => None,
        }
    }
}

/// A plan invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanViolation {
    #[error("plan payload is malformed: {0}")]
    Malformed(String),

    #[error("plan contains no cut")]
    EmptyCutList,

    #[error("operation {index}: negative time value")]
    NegativeTime { index: usize },

    #[error("operation {index}: window {start}..{end} does not have start < end")]
    InvertedWindow { index: usize, start: f64, end: f64 },

    #[error("operation {index}: ends at {end}s, past source duration {duration}s")]
    OutOfRange { index: usize, end: f64, duration: f64 },

    #[error("operation {index}: same track and window as operation {first}")]
    DuplicateOverlayWindow { index: usize, first: usize },

    #[error("operation {index}: anchor cut {anchor} does not exist ({cuts} cuts)")]
    AnchorOutOfRange {
        index: usize,
        anchor: usize,
        cuts: usize,
    },

    #[error("operation {index}: volume {volume} outside [0, 1]")]
    InvalidVolume { index: usize, volume: f64 },

    #[error("operation {index}: empty text")]
    EmptyText { index: usize },
}

impl PlanViolation {
    /// Index of the offending operation, when one is identifiable.
    pub fn index(&self) -> Option<usize> {
        match self {
            PlanViolation::Malformed(_) | PlanViolation::EmptyCutList => None,
            PlanViolation::NegativeTime { index }
            | PlanViolation::InvertedWindow { index, .. }
            | PlanViolation::OutOfRange { index, .. }
            | PlanViolation::DuplicateOverlayWindow { index, .. }
            | PlanViolation::AnchorOutOfRange { index, .. }
            | PlanViolation::InvalidVolume { index, .. }
            | PlanViolation::EmptyText { index } => Some(*index),
        }
    }

    /// Short name of the violated invariant.
    pub fn invariant(&self) -> &'static str {
        match self {
            PlanViolation::Malformed(_) => "well_formed",
            PlanViolation::EmptyCutList => "at_least_one_cut",
            PlanViolation::NegativeTime { .. } => "non_negative_time",
            PlanViolation::InvertedWindow { .. } => "start_before_end",
            PlanViolation::OutOfRange { .. } => "within_source_duration",
            PlanViolation::DuplicateOverlayWindow { .. } => "unique_track_window",
            PlanViolation::AnchorOutOfRange { .. } => "anchor_exists",
            PlanViolation::InvalidVolume { .. } => "volume_in_unit_range",
            PlanViolation::EmptyText { .. } => "non_empty_text",
        }
    }
}

/// Ordered list of editing operations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EditingPlan {
    pub operations: Vec<EditOperation>,
}

impl EditingPlan {
    pub fn new(operations: Vec<EditOperation>) -> Self {
        Self { operations }
    }

    /// Parse a JSON payload strictly.
    pub fn from_json(raw: &str) -> Result<Self, PlanViolation> {
        serde_json::from_str(raw).map_err(|e| PlanViolation::Malformed(e.to_string()))
    }

    /// JSON schema of the plan payload.
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(EditingPlan);
        serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
    }

    /// Cuts with their operation indices, in plan order.
    pub fn cuts(&self) -> impl Iterator<Item = (usize, &VideoCut)> {
        self.operations.iter().enumerate().filter_map(|(i, op)| match op {
            EditOperation::Cut(cut) => Some((i, cut)),
            _ => None,
        })
    }

    /// Non-cut operations with their operation indices, in plan order.
    pub fn overlays(&self) -> impl Iterator<Item = (usize, &EditOperation)> {
        self.operations
            .iter()
            .enumerate()
            .filter(|(_, op)| op.kind().is_overlay())
    }

    pub fn cut_count(&self) -> usize {
        self.cuts().count()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Check every plan invariant against a source of `duration` seconds.
    ///
    /// Returns the first violation in operation order.
    pub fn validate(&self, duration: f64) -> Result<(), PlanViolation> {
        let cut_count = self.cut_count();
        if cut_count == 0 {
            return Err(PlanViolation::EmptyCutList);
        }

        let mut windows: HashMap<(String, u64, u64), usize> = HashMap::new();

        for (index, op) in self.operations.iter().enumerate() {
            if let Some((start, end)) = op.window() {
                check_window(index, start, end, duration)?;
            }

            match op {
                EditOperation::Cut(cut) => {
                    if let Some(position) = cut.timeline_start {
                        if !(position >= 0.0) {
                            return Err(PlanViolation::NegativeTime { index });
                        }
                    }
                }
                EditOperation::Text(text) => {
                    if text.text.trim().is_empty() {
                        return Err(PlanViolation::EmptyText { index });
                    }
                }
                EditOperation::Subtitle(cue) => {
                    if cue.text.trim().is_empty() {
                        return Err(PlanViolation::EmptyText { index });
                    }
                }
                EditOperation::Audio(audio) => {
                    if !(0.0..=1.0).contains(&audio.volume) {
                        return Err(PlanViolation::InvalidVolume {
                            index,
                            volume: audio.volume,
                        });
                    }
                }
                EditOperation::Effect(effect) => {
                    if effect.anchor >= cut_count {
                        return Err(PlanViolation::AnchorOutOfRange {
                            index,
                            anchor: effect.anchor,
                            cuts: cut_count,
                        });
                    }
                    if !(effect.offset >= 0.0) || !(effect.duration >= 0.0) {
                        return Err(PlanViolation::NegativeTime { index });
                    }
                    if effect.duration == 0.0 {
                        return Err(PlanViolation::InvertedWindow {
                            index,
                            start: effect.offset,
                            end: effect.offset,
                        });
                    }
                }
                EditOperation::Sticker(sticker) => {
                    if sticker.content.trim().is_empty() {
                        return Err(PlanViolation::EmptyText { index });
                    }
                }
            }

            if let (Some(track), Some((start, end))) = (op.track_key(), op.window()) {
                let key = (track, start.to_bits(), end.to_bits());
                if let Some(first) = windows.get(&key) {
                    return Err(PlanViolation::DuplicateOverlayWindow {
                        index,
                        first: *first,
                    });
                }
                windows.insert(key, index);
            }
        }

        Ok(())
    }
}

fn check_window(index: usize, start: f64, end: f64, duration: f64) -> Result<(), PlanViolation> {
    // `!(x >= 0.0)` also catches NaN
    if !(start >= 0.0) || !(end >= 0.0) {
        return Err(PlanViolation::NegativeTime { index });
    }
    if start >= end {
        return Err(PlanViolation::InvertedWindow { index, start, end });
    }
    if end > duration {
        return Err(PlanViolation::OutOfRange {
            index,
            end,
            duration,
        });
    }
    Ok(())
}
