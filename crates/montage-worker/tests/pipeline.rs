//! End-to-end pipeline scenarios (spec §8), exercised against the real
//! chunk-planning, credits-merging, reconciliation, registry and
//! de-duplication functions the orchestrator composes. The document-store,
//! object-store and analyzer clients are reached over real network
//! protocols with no test seams of their own, so these scenarios drive the
//! same call sequence `Orchestrator::run_init`/`run_drive` uses, directly on
//! its component functions, rather than through a live `Orchestrator`.

use montage_analyzer::ParsedScene;
use montage_models::{
    seconds_to_timecode, CharacterRegistry, ChunkStatus, DetectedScene, EntryId, MontageEntry,
    ProgressDocument, SceneType, ScriptData, SheetId,
};
use montage_planner::{chunk_windows, merge_credits, CreditsMergerConfig};
use montage_worker::{dedup, reconciler, registry};

fn scene(start: u32, end: u32, desc: &str, dialogues: &str) -> ParsedScene {
    ParsedScene {
        start: seconds_to_timecode(start as f64, 25),
        end: seconds_to_timecode(end as f64, 25),
        plan_type: None,
        description: desc.to_string(),
        dialogues: dialogues.to_string(),
    }
}

fn entry_from_draft(sheet_id: SheetId, plan_number: u32, draft: &reconciler_output::DraftLike) -> MontageEntry {
    MontageEntry {
        id: EntryId::new(),
        sheet_id,
        plan_number,
        order_index: plan_number,
        start_timecode: draft.start_timecode,
        end_timecode: draft.end_timecode,
        plan_type: draft.plan_type.clone(),
        description: draft.description.clone(),
        dialogues: draft.dialogues.clone(),
    }
}

/// `DraftEntry` lives in `montage-persistence` behind a repo-shaped API; this
/// local mirror avoids pulling a live document-store client into the test
/// just to read its four plain fields back out.
mod reconciler_output {
    use montage_models::Timecode;

    pub struct DraftLike {
        pub start_timecode: Timecode,
        pub end_timecode: Timecode,
        pub plan_type: String,
        pub description: String,
        pub dialogues: String,
    }
}

fn to_draft_like(d: &montage_persistence::repos::DraftEntry) -> reconciler_output::DraftLike {
    reconciler_output::DraftLike {
        start_timecode: d.start_timecode,
        end_timecode: d.end_timecode,
        plan_type: d.plan_type.clone(),
        description: d.description.clone(),
        dialogues: d.dialogues.clone(),
    }
}

/// Scenario 1: a single-chunk video with no credits produces exactly one
/// completed chunk whose single parsed scene reconciles 1:1 against its
/// sole detector boundary, and is already finalize-clean (no duplicates,
/// one-element renumbering is a no-op).
#[test]
fn single_chunk_video_reconciles_and_finalizes_clean() {
    let sheet_id = SheetId::new();
    let chunks = chunk_windows(90.0, 25);
    assert_eq!(chunks.len(), 1);

    let cuts = vec![0.0, 90.0];
    let merged = merge_credits(&cuts, 90.0, 25, &CreditsMergerConfig::default());
    let mut progress = ProgressDocument::new(sheet_id, 25, chunks.clone());
    progress.detected_scenes = cuts.iter().map(|&t| DetectedScene { timecode: seconds_to_timecode(t, 25), timestamp: t }).collect();
    progress.merged_scenes = merged;

    let chunk = &progress.chunks[0];
    let boundaries: Vec<_> = progress.merged_scenes_in_window(0.0, 90.0).into_iter().cloned().collect();
    let parsed = vec![scene(0, 90, "герой входит в кадр", "ГАЛЯ\nПривет!")];
    let drafts = reconciler::reconcile(&parsed, &boundaries, 0.0, 90.0, 25);
    assert_eq!(drafts.len(), 1);

    let entries: Vec<MontageEntry> =
        drafts.iter().enumerate().map(|(i, d)| entry_from_draft(sheet_id, i as u32 + 1, &to_draft_like(d))).collect();

    let dropped = dedup::find_duplicates(&entries, 25);
    assert!(dropped.is_empty());

    let mut reg = CharacterRegistry::new();
    registry::record_speakers(&mut reg, &entries[0].dialogues, chunk.index, entries[0].start_timecode, None);
    assert_eq!(reg.entries().len(), 1);
}

/// Scenario 2: a two-chunk video with a rapid-cut opening run merges into
/// an `OpeningCredits` scene that spans chunk 0, leaving chunk 1 with the
/// regular per-scene boundaries; both chunks reconcile independently.
#[test]
fn two_chunk_video_with_opening_credits_merges_and_splits_across_chunks() {
    let duration = 240.0;
    let chunks = chunk_windows(duration, 25);
    assert!(chunks.len() >= 2);

    // A tight run of 1s cuts (logo/titles) that widens to 4s cuts, still
    // inside the opening-window cap, followed by the main film.
    let mut cuts: Vec<f64> = (0..=11).map(|i| i as f64).collect();
    cuts.extend([15.0, 19.0, 23.0, 27.0, 31.0, 35.0]);
    cuts.push(duration);

    let merged = merge_credits(&cuts, duration, 25, &CreditsMergerConfig::default());
    assert!(merged.iter().any(|s| s.scene_type == SceneType::OpeningCredits));

    let chunk0 = &chunks[0];
    let chunk1 = &chunks[1];
    let c0_start = 0.0;
    let c0_end = montage_models::timecode_to_seconds(chunk0.end_timecode, 25);
    let c1_start = c0_end;
    let c1_end = montage_models::timecode_to_seconds(chunk1.end_timecode, 25);

    let mut progress = ProgressDocument::new(SheetId::new(), 25, chunks.clone());
    progress.merged_scenes = merged;

    let boundaries0: Vec<_> = progress.merged_scenes_in_window(c0_start, c0_end).into_iter().cloned().collect();
    let boundaries1: Vec<_> = progress.merged_scenes_in_window(c1_start, c1_end).into_iter().cloned().collect();
    assert!(!boundaries0.is_empty());
    assert!(!boundaries1.is_empty());

    let parsed0 = vec![scene(0, 90, "титры", "")];
    let drafts0 = reconciler::reconcile(&parsed0, &boundaries0, c0_start, c0_end, 25);
    assert_eq!(drafts0.len(), 1);

    let parsed1 = vec![scene(150, 200, "герой идет по улице", "")];
    let drafts1 = reconciler::reconcile(&parsed1, &boundaries1, c1_start, c1_end, 25);
    assert!(!drafts1.is_empty());
}

/// Scenario 3: the analyzer returns no parseable scenes for a chunk (a
/// transient empty reply), leaving it pending for a later retry; on retry
/// it returns real content and the chunk reconciles normally. Mirrors
/// `run_drive`'s retry-failed-chunks pass.
#[test]
fn empty_analyzer_reply_then_successful_retry() {
    let boundaries = vec![];
    let empty_reply: Vec<ParsedScene> = montage_analyzer::parse_response("");
    let drafts_first_attempt = reconciler::reconcile(&empty_reply, &boundaries, 0.0, 90.0, 25);
    assert!(drafts_first_attempt.is_empty(), "an unparseable reply must not fabricate entries");

    let retried_reply = montage_analyzer::parse_response(
        "1. 00:00:00:00 - 00:00:10:00 Ср. герой входит в комнату\nГАЛЯ\nПривет!\n",
    );
    let drafts_retry = reconciler::reconcile(&retried_reply, &boundaries, 0.0, 90.0, 25);
    assert!(!drafts_retry.is_empty(), "retry with real content must reconcile to at least one entry");
}

/// Scenario 4: two racing chunk retries each insert the same plan (same
/// timecodes and near-identical text); the finalizer's de-duplicator must
/// collapse them back down to one, matching spec C10's documented
/// insert-collision tolerance.
#[test]
fn duplicate_entries_from_racing_retries_are_collapsed() {
    let sheet_id = SheetId::new();
    let parsed = vec![scene(10, 40, "герой садится за стол и открывает ноутбук", "")];
    let boundaries = vec![];

    let drafts_attempt_a = reconciler::reconcile(&parsed, &boundaries, 0.0, 90.0, 25);
    let drafts_attempt_b = reconciler::reconcile(&parsed, &boundaries, 0.0, 90.0, 25);

    let mut entries = Vec::new();
    entries.push(entry_from_draft(sheet_id, 1, &to_draft_like(&drafts_attempt_a[0])));
    entries.push(entry_from_draft(sheet_id, 2, &to_draft_like(&drafts_attempt_b[0])));

    let dropped = dedup::find_duplicates(&entries, 25);
    assert_eq!(dropped.len(), 1);

    let survivors: Vec<_> = entries.iter().filter(|e| !dropped.contains(&e.id)).collect();
    assert_eq!(survivors.len(), 1);
}

/// Scenario 5: every chunk fails the analyzer call; the video never
/// crosses the finalize threshold and `run_drive` would report it failed
/// rather than silently finalizing a sheet with zero completed chunks.
#[test]
fn all_chunks_failing_never_reaches_finalize_threshold() {
    let sheet_id = SheetId::new();
    let mut chunks = chunk_windows(300.0, 25);
    for chunk in &mut chunks {
        chunk.status = ChunkStatus::Failed;
    }
    let progress = ProgressDocument::new(sheet_id, 25, chunks);

    assert_eq!(progress.completion_ratio(), 0.0);
    assert!(progress.completion_ratio() < montage_worker::finalizer::FINALIZE_THRESHOLD);
    assert_eq!(progress.failed_chunks().count(), progress.total_chunks as usize);
}

/// Scenario 6: a character introduced in chunk 0 is sighted again in chunk
/// 2 under the same name; the registry snapshot the orchestrator threads
/// into chunk 2's prompt must already carry it with its appearance count
/// bumped rather than re-matching it against the script a second time.
#[test]
fn character_registry_propagates_across_chunks() {
    let mut reg = CharacterRegistry::new();
    let script = ScriptData { characters: vec!["Галина Петровна".to_string()] };

    registry::record_speakers(&mut reg, "ГАЛЯ\nПривет!", 0, seconds_to_timecode(5.0, 25), Some(&script));
    let after_chunk0 = reg.entries().iter().find(|e| e.canonical_name == "ГАЛЯ").unwrap().clone();
    assert_eq!(after_chunk0.appearances, 1);
    assert_eq!(after_chunk0.possible_script_match.as_deref(), Some("Галина Петровна"));

    // chunk 1 has no dialogue from ГАЛЯ
    registry::record_speakers(&mut reg, "ЮСЕФ ЗК\nЧто случилось?", 1, seconds_to_timecode(95.0, 25), Some(&script));

    // chunk 2: ГАЛЯ reappears
    registry::record_speakers(&mut reg, "ГАЛЯ\nЯ же говорила!", 2, seconds_to_timecode(200.0, 25), Some(&script));

    let galya = reg.entries().iter().find(|e| e.canonical_name == "ГАЛЯ").unwrap();
    assert_eq!(galya.appearances, 2);
    assert_eq!(galya.first_seen_chunk, 0);
    assert_eq!(reg.entries().len(), 2);
}
