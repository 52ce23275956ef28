//! Content analysis models.
//!
//! `AnalysisResponse` is the exact shape the language model must return.
//! It is checked and combined with the measured source properties into an
//! immutable `ContentAnalysis`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{BrightnessLevel, MotionLevel, VideoAsset};

/// Scene with its dominant classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SceneSummary {
    /// Scene start in seconds
    pub start: f64,
    /// Scene end in seconds
    pub end: f64,
    /// Dominant motion class
    pub motion: MotionLevel,
    /// Dominant brightness class
    pub brightness: BrightnessLevel,
    /// Short description of what happens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Window suggested as a highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HighlightWindow {
    pub start: f64,
    pub end: f64,
    /// Why this window is worth keeping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Analysis payload as returned by the language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AnalysisResponse {
    /// Kind of content (e.g. "vlog", "tutorial", "sports")
    pub content_type: String,
    /// Ordered scene boundaries
    pub scenes: Vec<SceneSummary>,
    /// Suggested highlight windows
    #[serde(default)]
    pub highlights: Vec<HighlightWindow>,
    /// Name of the preset the model would pick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_style: Option<String>,
    /// Free-form editing suggestions
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Measured properties of the source an analysis was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceSummary {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

impl From<&VideoAsset> for SourceSummary {
    fn from(asset: &VideoAsset) -> Self {
        Self {
            duration: asset.duration,
            width: asset.width,
            height: asset.height,
        }
    }
}

/// Model-derived summary of a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentAnalysis {
    pub source: SourceSummary,
    pub content_type: String,
    pub scenes: Vec<SceneSummary>,
    pub highlights: Vec<HighlightWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_style: Option<String>,
    pub suggestions: Vec<String>,
}

/// Reasons an analysis payload does not describe the source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisDefect {
    #[error("scene {index} has invalid range {start}..{end}")]
    InvalidScene { index: usize, start: f64, end: f64 },

    #[error("scene {index} starts before the previous scene ends")]
    UnorderedScene { index: usize },

    #[error("highlight {index} has invalid range {start}..{end}")]
    InvalidHighlight { index: usize, start: f64, end: f64 },

    #[error("{what} {index} ends at {end}s, past source duration {duration}s")]
    OutOfRange {
        what: &'static str,
        index: usize,
        end: f64,
        duration: f64,
    },
}

fn valid_range(start: f64, end: f64) -> bool {
    start.is_finite() && end.is_finite() && start >= 0.0 && start < end
}

impl AnalysisResponse {
    /// Check the payload against the source and produce a `ContentAnalysis`.
    pub fn into_analysis(self, source: SourceSummary) -> Result<ContentAnalysis, AnalysisDefect> {
        let mut previous_end = 0.0_f64;
        for (index, scene) in self.scenes.iter().enumerate() {
            if !valid_range(scene.start, scene.end) {
                return Err(AnalysisDefect::InvalidScene {
                    index,
                    start: scene.start,
                    end: scene.end,
                });
            }
            if scene.end > source.duration {
                return Err(AnalysisDefect::OutOfRange {
                    what: "scene",
                    index,
                    end: scene.end,
                    duration: source.duration,
                });
            }
            if scene.start < previous_end {
                return Err(AnalysisDefect::UnorderedScene { index });
            }
            previous_end = scene.end;
        }

        for (index, window) in self.highlights.iter().enumerate() {
            if !valid_range(window.start, window.end) {
                return Err(AnalysisDefect::InvalidHighlight {
                    index,
                    start: window.start,
                    end: window.end,
                });
            }
            if window.end > source.duration {
                return Err(AnalysisDefect::OutOfRange {
                    what: "highlight",
                    index,
                    end: window.end,
                    duration: source.duration,
                });
            }
        }

        Ok(ContentAnalysis {
            source,
            content_type: self.content_type,
            scenes: self.scenes,
            highlights: self.highlights,
            recommended_style: self.recommended_style,
            suggestions: self.suggestions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceSummary {
        SourceSummary {
            duration: 120.0,
            width: 1920,
            height: 1080,
        }
    }

    fn scene(start: f64, end: f64) -> SceneSummary {
        SceneSummary {
            start,
            end,
            motion: MotionLevel::Moderate,
            brightness: BrightnessLevel::Normal,
            description: None,
        }
    }

    fn response(scenes: Vec<SceneSummary>) -> AnalysisResponse {
        AnalysisResponse {
            content_type: "vlog".to_string(),
            scenes,
            highlights: vec![],
            recommended_style: None,
            suggestions: vec![],
        }
    }

    #[test]
    fn test_valid_response_becomes_analysis() {
        let analysis = response(vec![scene(0.0, 40.0), scene(40.0, 120.0)])
            .into_analysis(source())
            .unwrap();
        assert_eq!(analysis.scenes.len(), 2);
        assert_eq!(analysis.source.duration, 120.0);
    }

    #[test]
    fn test_unordered_scenes_rejected() {
        let err = response(vec![scene(30.0, 60.0), scene(10.0, 20.0)])
            .into_analysis(source())
            .unwrap_err();
        assert_eq!(err, AnalysisDefect::UnorderedScene { index: 1 });
    }

    #[test]
    fn test_scene_past_duration_rejected() {
        let err = response(vec![scene(0.0, 130.0)])
            .into_analysis(source())
            .unwrap_err();
        assert!(matches!(err, AnalysisDefect::OutOfRange { what: "scene", .. }));
    }

    #[test]
    fn test_negative_highlight_rejected() {
        let mut payload = response(vec![scene(0.0, 10.0)]);
        payload.highlights.push(HighlightWindow {
            start: -1.0,
            end: 5.0,
            reason: None,
        });
        let err = payload.into_analysis(source()).unwrap_err();
        assert!(matches!(err, AnalysisDefect::InvalidHighlight { index: 0, .. }));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let raw = r#"{"content_type":"vlog","scenes":[],"mood":"happy"}"#;
        assert!(serde_json::from_str::<AnalysisResponse>(raw).is_err());
    }

    #[test]
    fn test_scene_requires_classification() {
        let raw = r#"{"content_type":"vlog","scenes":[{"start":0,"end":5}]}"#;
        assert!(serde_json::from_str::<AnalysisResponse>(raw).is_err());
    }
}
