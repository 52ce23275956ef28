//! Plan generation stage.

use draftpilot_models::{ContentAnalysis, EditingPlan, StyleConfig};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AiError, AiResult};
use crate::provider::{extract_json, CompletionRequest, LanguageModel};

const SYSTEM_PROMPT: &str = "You are a professional video editor who plans edits as \
structured operations for a timeline editor. You answer with a single JSON object and \
nothing else.";

/// Asks the provider for an `EditingPlan` and validates it.
pub struct PlanGenerator {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl PlanGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            max_tokens: 2000,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Generate a plan.
    ///
    /// Provider failures are `ProviderUnavailable`; anything wrong with the
    /// payload itself is `PlanInvalid` naming the violated invariant.
    pub async fn generate(
        &self,
        analysis: &ContentAnalysis,
        style: &StyleConfig,
    ) -> AiResult<EditingPlan> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            prompt: build_prompt(analysis, style),
            max_tokens: self.max_tokens,
        };

        let text = self
            .model
            .complete(&request)
            .await
            .map_err(|e| AiError::ProviderUnavailable(e.to_string()))?;

        let plan = EditingPlan::from_json(extract_json(&text)).map_err(AiError::PlanInvalid)?;
        if let Err(violation) = plan.validate(analysis.source.duration) {
            warn!(
                invariant = violation.invariant(),
                index = ?violation.index(),
                "Generated plan rejected: {}",
                violation
            );
            return Err(AiError::PlanInvalid(violation));
        }

        info!(
            style = %style.name,
            operations = plan.len(),
            cuts = plan.cut_count(),
            "Editing plan generated"
        );
        Ok(plan)
    }
}

fn build_prompt(analysis: &ContentAnalysis, style: &StyleConfig) -> String {
    let duration = analysis.source.duration;
    let target = style.target_duration_for(duration);
    let (width, height) = style.resolution();
    let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_default();
    let schema = serde_json::to_string_pretty(&EditingPlan::json_schema()).unwrap_or_default();

    let captions = if style.wants_captions() {
        "Add subtitle operations for spoken or key moments."
    } else {
        "Do not add subtitle operations."
    };
    let music = match (style.add_music, &style.music_track) {
        (true, Some(track)) => format!(
            "Add one audio operation with source \"{track}\" at volume {} spanning the edit.",
            style.music_volume
        ),
        _ => "Do not add audio operations.".to_string(),
    };

    format!(
        r#"Plan an edit of this video.

CONTENT ANALYSIS:
{analysis_json}

STYLE:
- name: {name}
- target duration: {target:.1} seconds (sum of cut lengths)
- output: {width}x{height} ({aspect}, {quality})
- pacing: {pacing}
- {captions}
- {music}

RULES:
- Include at least one "cut" operation. Cuts are placed on the timeline in the order given.
- Every start/end time is in seconds of the source, with start < end and end <= {duration}.
- Two text or sticker operations on the same track must not share the same start and end.
- Effect "anchor" is the zero-based index of a cut among the cut operations.
- Volumes are between 0 and 1. Text must not be empty.

Return ONLY a single JSON object matching this JSON schema. Do not add other fields.
{schema}
"#,
        name = style.name,
        aspect = style.aspect_ratio,
        quality = style.quality,
        pacing = style.pacing,
    )
}
