//! Source ingestion for the draftpilot pipeline.
//!
//! This crate provides:
//! - FFprobe-based construction of `VideoAsset`
//! - FFmpeg-based sampling of coarse signals (brightness, motion, scene changes)
//!
//! Nothing here decodes frames in-process; all measurement is delegated to
//! the FFmpeg CLI tools.

pub mod error;
pub mod probe;
pub mod signals;
pub mod tools;

pub use error::{MediaError, MediaResult};
pub use probe::{ingest, probe_asset};
pub use signals::{sample_signals, SamplingOptions};
pub use tools::MediaTools;
