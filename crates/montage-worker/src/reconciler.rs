//! Reconciliation of a chunk's parsed scenes against its detector boundaries
//! (C9).
//!
//! The analyzer is given the detector's boundaries verbatim in the prompt
//! (see `montage_analyzer::prompt::build_prompt`) and asked to describe each
//! one, but it is free-text and can drop, merge, or invent scenes. This
//! module decides, per chunk, how much of the model's output to trust.

use montage_analyzer::parser::ParsedScene;
use montage_models::{
    timecode_to_seconds, MergedScene, Timecode, DEFAULT_DIALOGUES, DEFAULT_PLAN_TYPE,
};
use montage_persistence::repos::DraftEntry;

/// Scenes starting up to this many seconds before the chunk's own start are
/// still accepted; the model often anchors a scene a touch early when a cut
/// lands right on the boundary.
const CLAMP_LEAD_SECS: f64 = 1.0;

/// Reconcile `parsed` against the detector's `boundaries` for a chunk
/// spanning `[chunk_start_secs, chunk_end_secs)`.
///
/// When the counts match and both sequences are already ordered by start,
/// scenes are aligned positionally: the final scene takes its timecodes from
/// `boundaries` and its content from `parsed`. Otherwise the model's own
/// timecodes are kept, and any scene starting outside
/// `[chunk_start_secs - 1s, chunk_end_secs)` is dropped. An empty
/// `boundaries` always takes this second path.
pub fn reconcile(
    parsed: &[ParsedScene],
    boundaries: &[MergedScene],
    chunk_start_secs: f64,
    chunk_end_secs: f64,
    fps: u32,
) -> Vec<DraftEntry> {
    if !boundaries.is_empty() && parsed.len() == boundaries.len() && is_ordered(parsed) && is_ordered_boundaries(boundaries) {
        return parsed
            .iter()
            .zip(boundaries.iter())
            .map(|(scene, boundary)| {
                to_draft(boundary.start_timecode, boundary.end_timecode, scene)
            })
            .collect();
    }

    let lo = chunk_start_secs - CLAMP_LEAD_SECS;
    parsed
        .iter()
        .filter(|scene| {
            let start_secs = timecode_to_seconds(scene.start, fps);
            start_secs >= lo && start_secs < chunk_end_secs
        })
        .map(|scene| to_draft(scene.start, scene.end, scene))
        .collect()
}

fn to_draft(start: Timecode, end: Timecode, scene: &ParsedScene) -> DraftEntry {
    let plan_type = match &scene.plan_type {
        Some(t) if !t.trim().is_empty() => t.clone(),
        _ => DEFAULT_PLAN_TYPE.to_string(),
    };
    let dialogues = if scene.dialogues.trim().is_empty() {
        DEFAULT_DIALOGUES.to_string()
    } else {
        scene.dialogues.clone()
    };
    DraftEntry {
        start_timecode: start,
        end_timecode: end,
        plan_type,
        description: scene.description.clone(),
        dialogues,
    }
}

fn is_ordered(scenes: &[ParsedScene]) -> bool {
    scenes.windows(2).all(|w| w[0].start <= w[1].start)
}

fn is_ordered_boundaries(scenes: &[MergedScene]) -> bool {
    scenes.windows(2).all(|w| w[0].start_timecode <= w[1].start_timecode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_models::SceneType;

    fn tc(s: u32) -> Timecode {
        Timecode::at_whole_second(0, s / 60, s % 60)
    }

    fn parsed(start: u32, end: u32, desc: &str) -> ParsedScene {
        ParsedScene {
            start: tc(start),
            end: tc(end),
            plan_type: None,
            description: desc.to_string(),
            dialogues: String::new(),
        }
    }

    fn boundary(start: u32, end: u32) -> MergedScene {
        MergedScene {
            start_timecode: tc(start),
            end_timecode: tc(end),
            start_timestamp: start as f64,
            end_timestamp: end as f64,
            scene_type: SceneType::Regular,
            original_scenes_count: 1,
        }
    }

    #[test]
    fn perfect_match_takes_timecodes_from_boundaries() {
        let parsed = vec![parsed(5, 30, "a"), parsed(31, 60, "b")];
        let boundaries = vec![boundary(0, 29), boundary(29, 58)];
        let drafts = reconcile(&parsed, &boundaries, 0.0, 180.0, 25);

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].start_timecode, boundaries[0].start_timecode);
        assert_eq!(drafts[0].end_timecode, boundaries[0].end_timecode);
        assert_eq!(drafts[0].description, "a");
        assert_eq!(drafts[1].start_timecode, boundaries[1].start_timecode);
        assert_eq!(drafts[1].description, "b");
    }

    #[test]
    fn mismatched_counts_fall_back_to_clamping() {
        let parsed = vec![parsed(5, 30, "a"), parsed(31, 60, "b"), parsed(61, 90, "c")];
        let boundaries = vec![boundary(0, 29), boundary(29, 58)];
        let drafts = reconcile(&parsed, &boundaries, 0.0, 180.0, 25);

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].start_timecode, parsed[0].start);
    }

    #[test]
    fn clamping_drops_scenes_outside_window() {
        let parsed = vec![
            parsed(5, 30, "within lead"),
            parsed(200, 230, "past end"),
        ];
        let drafts = reconcile(&parsed, &[], 0.0, 180.0, 25);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].description, "within lead");
    }

    #[test]
    fn clamp_accepts_scene_starting_just_before_chunk_start() {
        let mut early = parsed(0, 10, "early");
        early.start = Timecode::at_whole_second(0, 2, 59);
        let drafts = reconcile(&[early], &[], 180.0, 360.0, 25);
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn empty_boundaries_uses_parsed_directly_with_clamping() {
        let parsed = vec![parsed(5, 30, "a")];
        let drafts = reconcile(&parsed, &[], 0.0, 180.0, 25);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].start_timecode, parsed[0].start);
    }

    #[test]
    fn every_surviving_scene_respects_clamp_bounds() {
        let parsed = vec![
            parsed(0, 10, "a"),
            parsed(90, 120, "b"),
            parsed(179, 200, "c"),
            parsed(500, 520, "d"),
        ];
        let chunk_start = 0.0;
        let chunk_end = 180.0;
        let drafts = reconcile(&parsed, &[], chunk_start, chunk_end, 25);

        for draft in &drafts {
            let start_secs = timecode_to_seconds(draft.start_timecode, 25);
            assert!(start_secs >= chunk_start - CLAMP_LEAD_SECS);
            assert!(start_secs < chunk_end);
        }
    }

    #[test]
    fn defaults_are_filled_for_missing_fields() {
        let mut scene = parsed(5, 30, "a");
        scene.plan_type = None;
        scene.dialogues = String::new();
        let drafts = reconcile(&[scene], &[], 0.0, 180.0, 25);

        assert_eq!(drafts[0].plan_type, DEFAULT_PLAN_TYPE);
        assert_eq!(drafts[0].dialogues, DEFAULT_DIALOGUES);
    }
}
