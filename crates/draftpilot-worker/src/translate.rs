//! Plan-to-call translation.

use draftpilot_draft::{
    AddAudioRequest, AddEffectRequest, AddStickerRequest, AddSubtitleRequest, AddTextRequest,
    AddVideoRequest, DraftRequest, SaveDraftRequest,
};
use draftpilot_models::{DraftId, EditOperation, EditingPlan, PlanViolation, StyleConfig, VideoAsset};

/// Values every call of one execution shares.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationContext {
    pub source_url: String,
    pub width: u32,
    pub height: u32,
    pub draft_id: DraftId,
    pub draft_folder: String,
}

impl TranslationContext {
    /// Output size from the style, source from the asset.
    pub fn new(
        asset: &VideoAsset,
        style: &StyleConfig,
        draft_id: DraftId,
        draft_folder: impl Into<String>,
    ) -> Self {
        let (width, height) = style.resolution();
        Self {
            source_url: asset.source_url(),
            width,
            height,
            draft_id,
            draft_folder: draft_folder.into(),
        }
    }
}

/// Wire requests for one plan, keyed by plan index.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedPlan {
    /// Cuts in plan order
    pub cuts: Vec<(usize, DraftRequest)>,
    /// Every other operation
    pub overlays: Vec<(usize, DraftRequest)>,
    pub save: SaveDraftRequest,
}

/// Translate a validated plan into draft server requests.
///
/// Cuts without an explicit timeline position are appended after the
/// preceding cut. Effects start at their anchor cut's timeline position
/// plus their offset.
pub fn translate(plan: &EditingPlan, ctx: &TranslationContext) -> Result<TranslatedPlan, PlanViolation> {
    let draft_id = ctx.draft_id.as_str().to_string();

    let mut cuts = Vec::new();
    let mut cut_positions = Vec::new();
    let mut cursor = 0.0;
    for (index, cut) in plan.cuts() {
        let target_start = cut.timeline_start.unwrap_or(cursor);
        cursor = target_start + cut.duration();
        cut_positions.push(target_start);
        cuts.push((
            index,
            DraftRequest::Video(AddVideoRequest {
                video_url: ctx.source_url.clone(),
                start: cut.source_start,
                end: cut.source_end,
                width: ctx.width,
                height: ctx.height,
                draft_id: draft_id.clone(),
                target_start,
            }),
        ));
    }

    let mut overlays = Vec::new();
    for (index, op) in plan.overlays() {
        let request = match op {
            EditOperation::Text(t) => DraftRequest::Text(AddTextRequest {
                text: t.text.clone(),
                start: t.start,
                end: t.end,
                font: t.font.clone(),
                font_color: t.font_color.clone(),
                font_size: t.font_size,
                track_name: t.track.clone(),
                draft_id: draft_id.clone(),
            }),
            EditOperation::Audio(a) => DraftRequest::Audio(AddAudioRequest {
                audio_url: a.source.clone(),
                start: a.start,
                end: a.end,
                volume: a.volume,
                draft_id: draft_id.clone(),
            }),
            EditOperation::Subtitle(s) => DraftRequest::Subtitle(AddSubtitleRequest {
                text: s.text.clone(),
                start: s.start,
                end: s.end,
                draft_id: draft_id.clone(),
            }),
            EditOperation::Effect(e) => {
                let anchor_start =
                    *cut_positions
                        .get(e.anchor)
                        .ok_or(PlanViolation::AnchorOutOfRange {
                            index,
                            anchor: e.anchor,
                            cuts: cut_positions.len(),
                        })?;
                let start = anchor_start + e.offset;
                DraftRequest::Effect(AddEffectRequest {
                    effect_type: e.effect_type.clone(),
                    effect_name: e.effect_name.clone(),
                    start,
                    end: start + e.duration,
                    draft_id: draft_id.clone(),
                })
            }
            EditOperation::Sticker(s) => DraftRequest::Sticker(AddStickerRequest {
                sticker_type: s.sticker_type.clone(),
                sticker_content: s.content.clone(),
                start: s.start,
                end: s.end,
                x: s.x,
                y: s.y,
                draft_id: draft_id.clone(),
            }),
            EditOperation::Cut(_) => continue,
        };
        overlays.push((index, request));
    }

    Ok(TranslatedPlan {
        cuts,
        overlays,
        save: SaveDraftRequest {
            draft_id,
            draft_folder: ctx.draft_folder.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftpilot_models::{AspectRatio, EffectOp, TextOverlay, VideoCut};

    fn ctx() -> TranslationContext {
        let asset = VideoAsset::new("/in/trip.mp4", 120.0, 1920, 1080);
        let style = StyleConfig::new("custom").with_aspect_ratio(AspectRatio::PORTRAIT);
        TranslationContext::new(&asset, &style, DraftId::from("trip_1"), "./drafts")
    }

    fn effect(anchor: usize, offset: f64) -> EditOperation {
        EditOperation::Effect(EffectOp {
            effect_type: "transition".into(),
            effect_name: "fade".into(),
            anchor,
            offset,
            duration: 1.0,
        })
    }

    #[test]
    fn test_cuts_append_in_plan_order() {
        let plan = EditingPlan::new(vec![
            EditOperation::Cut(VideoCut::new(0.0, 30.0)),
            EditOperation::Text(TextOverlay::new("Hi", 2.0, 5.0)),
            EditOperation::Cut(VideoCut::new(60.0, 90.0)),
        ]);
        let translated = translate(&plan, &ctx()).unwrap();

        assert_eq!(translated.cuts.len(), 2);
        assert_eq!(translated.cuts[0].0, 0);
        assert_eq!(translated.cuts[1].0, 2);
        match &translated.cuts[1].1 {
            DraftRequest::Video(v) => {
                assert_eq!(v.video_url, "/in/trip.mp4");
                assert_eq!((v.start, v.end), (60.0, 90.0));
                assert_eq!(v.target_start, 30.0);
                assert_eq!((v.width, v.height), (607, 1080));
                assert_eq!(v.draft_id, "trip_1");
            }
            other => panic!("expected video, got {other:?}"),
        }

        assert_eq!(translated.overlays.len(), 1);
        match &translated.overlays[0].1 {
            DraftRequest::Text(t) => {
                assert_eq!(t.track_name, "text_main");
                assert_eq!(t.draft_id, "trip_1");
            }
            other => panic!("expected text, got {other:?}"),
        }
        assert_eq!(translated.save.draft_folder, "./drafts");
    }

    #[test]
    fn test_explicit_timeline_start_moves_cursor() {
        let mut placed = VideoCut::new(10.0, 20.0);
        placed.timeline_start = Some(50.0);
        let plan = EditingPlan::new(vec![
            EditOperation::Cut(placed),
            EditOperation::Cut(VideoCut::new(30.0, 35.0)),
            effect(1, 0.5),
        ]);
        let translated = translate(&plan, &ctx()).unwrap();

        match &translated.cuts[1].1 {
            DraftRequest::Video(v) => assert_eq!(v.target_start, 60.0),
            other => panic!("expected video, got {other:?}"),
        }
        match &translated.overlays[0].1 {
            DraftRequest::Effect(e) => assert_eq!((e.start, e.end), (60.5, 61.5)),
            other => panic!("expected effect, got {other:?}"),
        }
    }

    #[test]
    fn test_dangling_anchor() {
        let plan = EditingPlan::new(vec![EditOperation::Cut(VideoCut::new(0.0, 5.0)), effect(3, 0.0)]);
        let err = translate(&plan, &ctx()).unwrap_err();
        assert!(matches!(err, PlanViolation::AnchorOutOfRange { index: 1, anchor: 3, cuts: 1 }));
    }
}
