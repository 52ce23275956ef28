//! Shared data models for the draftpilot editing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Source video assets and their sampled signals
//! - Model-derived content analysis
//! - Style presets
//! - Editing plans and their validation
//! - Draft execution sessions

pub mod analysis;
pub mod asset;
pub mod plan;
pub mod session;
pub mod style;

// Re-export common types
pub use analysis::{
    AnalysisDefect, AnalysisResponse, ContentAnalysis, HighlightWindow, SceneSummary, SourceSummary,
};
pub use asset::{BrightnessLevel, MotionLevel, SampledSignals, VideoAsset};
pub use plan::{
    AudioTrack, EditOperation, EditingPlan, EffectOp, OperationKind, PlanViolation, StickerOp,
    SubtitleCue, TextOverlay, VideoCut,
};
pub use session::{
    DraftId, DraftSession, FailureKind, OperationFailure, OperationRecord, OperationStatus,
    SaveRecord, SessionError,
};
pub use style::{
    AspectRatio, CaptionPolicy, Pacing, PresetLoadError, Quality, StyleConfig, StylePresets,
};
