//! Client for the local draft-authoring HTTP server.
//!
//! This crate provides:
//! - Typed request structs for every draft endpoint (wire names fixed)
//! - A single-attempt `DraftTransport` seam with a reqwest implementation
//! - `DraftClient`, which adds retry, timeout and metrics on top
//! - An endpoint availability probe

pub mod client;
pub mod error;
pub mod metrics;
pub mod transport;
pub mod types;

pub use client::{DraftClient, DraftClientConfig};
pub use error::{CallFailure, DraftError, DraftResult};
pub use transport::{DraftTransport, HttpTransport};
pub use types::{
    Acknowledgement, AddAudioRequest, AddEffectRequest, AddStickerRequest, AddSubtitleRequest,
    AddTextRequest, AddVideoRequest, DraftRequest, Endpoint, EndpointReport, EndpointStatus,
    SaveAck, SaveDraftRequest,
};
