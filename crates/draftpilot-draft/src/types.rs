//! Wire types for the draft server.
//!
//! Field names are part of the server contract and must not be renamed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Draft server endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    AddVideo,
    AddText,
    AddAudio,
    AddSubtitle,
    AddEffect,
    AddSticker,
    SaveDraft,
}

impl Endpoint {
    pub const ALL: &'static [Endpoint] = &[
        Endpoint::AddVideo,
        Endpoint::AddText,
        Endpoint::AddAudio,
        Endpoint::AddSubtitle,
        Endpoint::AddEffect,
        Endpoint::AddSticker,
        Endpoint::SaveDraft,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::AddVideo => "/add_video",
            Endpoint::AddText => "/add_text",
            Endpoint::AddAudio => "/add_audio",
            Endpoint::AddSubtitle => "/add_subtitle",
            Endpoint::AddEffect => "/add_effect",
            Endpoint::AddSticker => "/add_sticker",
            Endpoint::SaveDraft => "/save_draft",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddVideoRequest {
    pub video_url: String,
    pub start: f64,
    pub end: f64,
    pub width: u32,
    pub height: u32,
    pub draft_id: String,
    pub target_start: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddTextRequest {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub font: String,
    pub font_color: String,
    pub font_size: f64,
    pub track_name: String,
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddAudioRequest {
    pub audio_url: String,
    pub start: f64,
    pub end: f64,
    pub volume: f64,
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddSubtitleRequest {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddEffectRequest {
    pub effect_type: String,
    pub effect_name: String,
    pub start: f64,
    pub end: f64,
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddStickerRequest {
    pub sticker_type: String,
    pub sticker_content: String,
    pub start: f64,
    pub end: f64,
    pub x: f64,
    pub y: f64,
    pub draft_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDraftRequest {
    pub draft_id: String,
    pub draft_folder: String,
}

/// Any element-adding request.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftRequest {
    Video(AddVideoRequest),
    Text(AddTextRequest),
    Audio(AddAudioRequest),
    Subtitle(AddSubtitleRequest),
    Effect(AddEffectRequest),
    Sticker(AddStickerRequest),
}

impl DraftRequest {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            DraftRequest::Video(_) => Endpoint::AddVideo,
            DraftRequest::Text(_) => Endpoint::AddText,
            DraftRequest::Audio(_) => Endpoint::AddAudio,
            DraftRequest::Subtitle(_) => Endpoint::AddSubtitle,
            DraftRequest::Effect(_) => Endpoint::AddEffect,
            DraftRequest::Sticker(_) => Endpoint::AddSticker,
        }
    }
}

/// Successful element call.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    /// Server element id, when the response carries one
    pub element_id: Option<String>,
    /// Raw response payload
    pub payload: Value,
    /// Attempts it took, including the successful one
    pub attempts: u32,
}

impl Acknowledgement {
    pub(crate) fn from_payload(payload: Value, attempts: u32) -> Self {
        let element_id = ["element_id", "id", "segment_id", "material_id"]
            .iter()
            .find_map(|key| lookup(&payload, key))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        Self {
            element_id,
            payload,
            attempts,
        }
    }
}

/// Successful `save_draft` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveAck {
    pub draft_path: String,
    pub payload: Value,
    pub attempts: u32,
}

impl SaveAck {
    /// Draft location from `draft_path`, `output.draft_path` or `output.draft_url`.
    pub(crate) fn draft_path_of(payload: &Value) -> Option<String> {
        let candidates = [
            payload.get("draft_path"),
            payload.get("output").and_then(|o| o.get("draft_path")),
            payload.get("output").and_then(|o| o.get("draft_url")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find_map(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Look a key up at the top level, then inside `output`.
fn lookup<'a>(payload: &'a Value, key: &str) -> Option<&'a Value> {
    payload
        .get(key)
        .or_else(|| payload.get("output").and_then(|o| o.get(key)))
        .filter(|v| !v.is_null())
}

/// Availability of one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointStatus {
    pub endpoint: Endpoint,
    pub path: &'static str,
    /// HTTP status of an empty POST, if one was received
    pub status: Option<u16>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Endpoint availability report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointReport {
    pub entries: Vec<EndpointStatus>,
}

impl EndpointReport {
    pub fn available(&self) -> impl Iterator<Item = &EndpointStatus> {
        self.entries.iter().filter(|e| e.available)
    }

    pub fn all_available(&self) -> bool {
        self.entries.iter().all(|e| e.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let video = AddVideoRequest {
            video_url: "/in.mp4".into(),
            start: 0.0,
            end: 30.0,
            width: 1920,
            height: 1080,
            draft_id: "d1".into(),
            target_start: 0.0,
        };
        let body = serde_json::to_value(&video).unwrap();
        let req = DraftRequest::Video(video);
        for key in ["video_url", "start", "end", "width", "height", "draft_id", "target_start"] {
            assert!(body.get(key).is_some(), "missing {key}");
        }
        assert_eq!(req.endpoint().path(), "/add_video");

        let sticker = serde_json::to_value(AddStickerRequest {
            sticker_type: "emoji".into(),
            sticker_content: "*".into(),
            start: 0.0,
            end: 1.0,
            x: 10.0,
            y: 20.0,
            draft_id: "d1".into(),
        })
        .unwrap();
        assert_eq!(sticker["sticker_content"], "*");
    }

    #[test]
    fn test_element_id_lookup() {
        let ack = Acknowledgement::from_payload(json!({"success": true, "output": {"id": 42}}), 1);
        assert_eq!(ack.element_id.as_deref(), Some("42"));

        let ack = Acknowledgement::from_payload(json!({"element_id": "seg-7"}), 2);
        assert_eq!(ack.element_id.as_deref(), Some("seg-7"));
        assert_eq!(ack.attempts, 2);

        let ack = Acknowledgement::from_payload(json!({"success": true}), 1);
        assert_eq!(ack.element_id, None);
    }

    #[test]
    fn test_draft_path_lookup() {
        assert_eq!(
            SaveAck::draft_path_of(&json!({"draft_path": "/d/dfd_x"})).as_deref(),
            Some("/d/dfd_x")
        );
        assert_eq!(
            SaveAck::draft_path_of(&json!({"output": {"draft_url": "file:///d/x"}})).as_deref(),
            Some("file:///d/x")
        );
        assert_eq!(SaveAck::draft_path_of(&json!({"success": true})), None);
        assert_eq!(SaveAck::draft_path_of(&json!({"draft_path": ""})), None);
    }
}
