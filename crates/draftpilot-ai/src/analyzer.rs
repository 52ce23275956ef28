//! Content analysis stage.

use draftpilot_models::{AnalysisResponse, ContentAnalysis, SourceSummary, VideoAsset};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AiError, AiResult};
use crate::provider::{extract_json, CompletionRequest, LanguageModel};

const SYSTEM_PROMPT: &str = "You are a professional video editor. You analyze footage \
descriptions and answer with a single JSON object and nothing else.";

/// Asks the provider for a `ContentAnalysis` of one source.
pub struct ContentAnalyzer {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl ContentAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_tokens: 1500,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Analyze a source. Every failure is `AnalysisUnavailable`.
    pub async fn analyze(&self, asset: &VideoAsset) -> AiResult<ContentAnalysis> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(asset),
            max_tokens: self.max_tokens,
        };

        let text = self.model.complete(&request).await.map_err(|e| {
            warn!(path = %asset.path.display(), error = %e, "Analysis request failed");
            AiError::analysis_unavailable(format!("provider: {e}"))
        })?;

        let analysis = parse_analysis(&text, SourceSummary::from(asset))?;
        info!(
            path = %asset.path.display(),
            content_type = %analysis.content_type,
            scenes = analysis.scenes.len(),
            highlights = analysis.highlights.len(),
            "Content analysis complete"
        );
        Ok(analysis)
    }
}

fn build_prompt(asset: &VideoAsset) -> String {
    let signals = &asset.signals;
    let facts = json!({
        "duration_seconds": asset.duration,
        "width": asset.width,
        "height": asset.height,
        "aspect_ratio": asset.aspect_label(),
        "fps": asset.fps,
        "codec": asset.codec,
        "has_audio": asset.has_audio,
        "scene_changes": signals.scene_changes,
        "average_brightness": signals.average_brightness,
        "brightness_level": signals.brightness_level(),
        "average_motion": signals.average_motion,
        "motion_level": signals.motion_level(),
    });
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(AnalysisResponse))
        .unwrap_or_default();
    let facts = serde_json::to_string_pretty(&facts).unwrap_or_default();

    format!(
        r#"Analyze this video for editing.

MEASURED PROPERTIES:
{facts}

Describe:
1. The kind of content (content_type)
2. Scene boundaries in order, each with its dominant motion (static, moderate, high) and brightness (dark, normal, bright)
3. The most engaging highlight windows and why
4. Which editing style fits best (social_media, highlight_reel, tutorial or vlog)
5. Short editing suggestions

All times are in seconds from the start of the source and must lie within 0 and {duration}.
Scenes must be ordered and must not overlap.

Return ONLY a single JSON object matching this JSON schema. Do not add other fields.
{schema}
"#,
        duration = asset.duration,
    )
}

fn parse_analysis(text: &str, source: SourceSummary) -> AiResult<ContentAnalysis> {
    let response: AnalysisResponse = serde_json::from_str(extract_json(text))
        .map_err(|e| AiError::analysis_unavailable(format!("malformed analysis: {e}")))?;
    response
        .into_analysis(source)
        .map_err(|e| AiError::analysis_unavailable(e.to_string()))
}
