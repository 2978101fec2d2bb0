//! Entry de-duplication and pacing validation (C13).
//!
//! Runs once per finalization pass over a sheet's full, chunk-order-sorted
//! entry list: first drops exact and near-duplicate rows (a hazard from
//! retried chunks and from the reconciler's fallback clamping path
//! producing overlapping windows), then logs pacing warnings without
//! mutating anything.

use std::collections::HashSet;

use montage_models::{frames_between, EntryId, MontageEntry};
use tracing::warn;

/// Word tokens shorter than this carry too little signal for similarity.
const MIN_TOKEN_LEN: usize = 2;

/// Weight given to description similarity in the combined score.
const DESC_WEIGHT: f64 = 0.7;
const DIALOGUE_WEIGHT: f64 = 0.3;

/// Similarity threshold when the two entries start within half a second of
/// each other (the common case for a reconciler-clamp artifact).
const THRESHOLD_CLOSE: f64 = 0.4;
/// Threshold for entries further apart in time, but still within
/// [`NEAR_DUPLICATE_WINDOW_SECS`].
const THRESHOLD_FAR: f64 = 0.6;
const CLOSE_START_SECS: f64 = 0.5;
/// Near-duplicate scoring only applies when two entries start within this
/// many seconds of each other; entries further apart are never collapsed no
/// matter how similar their text.
const NEAR_DUPLICATE_WINDOW_SECS: f64 = 2.0;

/// Find entries to drop: exact duplicates by `(start, end)` timecode pair,
/// and near-duplicates by combined description/dialogue similarity. `fps` is
/// needed to compare start times in seconds. `entries` must already be
/// sorted in final order (`order_index` ascending); for every duplicate
/// pair the later entry is dropped.
pub fn find_duplicates(entries: &[MontageEntry], fps: u32) -> Vec<EntryId> {
    let mut dropped = HashSet::new();
    let mut kept_indices: Vec<usize> = Vec::new();

    for (i, entry) in entries.iter().enumerate() {
        let mut is_duplicate = false;
        for &j in &kept_indices {
            let other = &entries[j];
            if entry.start_timecode == other.start_timecode && entry.end_timecode == other.end_timecode {
                is_duplicate = true;
                break;
            }
            if is_near_duplicate(entry, other, fps) {
                is_duplicate = true;
                break;
            }
        }
        if is_duplicate {
            dropped.insert(entry.id);
        } else {
            kept_indices.push(i);
        }
    }

    entries.iter().filter(|e| dropped.contains(&e.id)).map(|e| e.id).collect()
}

fn is_near_duplicate(a: &MontageEntry, b: &MontageEntry, fps: u32) -> bool {
    let start_gap_frames = frames_between(a.start_timecode, b.start_timecode, fps).unsigned_abs();
    let start_gap_secs = start_gap_frames as f64 / fps as f64;
    if start_gap_secs >= NEAR_DUPLICATE_WINDOW_SECS {
        return false;
    }

    let desc_sim = jaccard_similarity(&a.description, &b.description);
    let dialogue_sim = jaccard_similarity(&a.dialogues, &b.dialogues);
    let combined = DESC_WEIGHT * desc_sim + DIALOGUE_WEIGHT * dialogue_sim;

    let threshold = if start_gap_secs < CLOSE_START_SECS { THRESHOLD_CLOSE } else { THRESHOLD_FAR };

    combined >= threshold
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= MIN_TOKEN_LEN)
        .map(|w| w.to_string())
        .collect()
}

fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Pacing buckets: expected plan count per minute of runtime for each style.
const PACE_SLOW: f64 = 10.0;
const PACE_MEDIUM: f64 = 15.0;
const PACE_FAST: f64 = 22.0;

/// Validate pacing and ordering; logs warnings, never mutates `entries`.
/// `entries` must be sorted and fully renumbered already.
pub fn validate(entries: &[MontageEntry], fps: u32) {
    for window in entries.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        let gap = frames_between(prev.end_timecode, next.start_timecode, fps);
        if gap < 0 {
            warn!(
                prev_plan = prev.plan_number,
                next_plan = next.plan_number,
                gap_frames = gap,
                "entries overlap"
            );
        } else if gap > 0 {
            warn!(
                prev_plan = prev.plan_number,
                next_plan = next.plan_number,
                gap_frames = gap,
                "gap between entries"
            );
        }
    }

    if let (Some(first), Some(last)) = (entries.first(), entries.last()) {
        let total_frames = frames_between(first.start_timecode, last.end_timecode, fps).max(0);
        let duration_min = total_frames as f64 / fps as f64 / 60.0;
        if duration_min <= 0.0 {
            return;
        }
        let actual_count = entries.len() as f64;
        let buckets = [
            ("slow", duration_min * PACE_SLOW),
            ("medium", duration_min * PACE_MEDIUM),
            ("fast", duration_min * PACE_FAST),
        ];
        let (closest_label, closest_expected) = buckets
            .iter()
            .min_by(|a, b| (a.1 - actual_count).abs().partial_cmp(&(b.1 - actual_count).abs()).unwrap())
            .unwrap();
        warn!(
            actual_count,
            closest_pace = closest_label,
            expected_for_pace = closest_expected,
            "sheet pacing estimate"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_models::{SheetId, Timecode};

    fn entry(plan_number: u32, start: u32, end: u32, desc: &str, dialogues: &str) -> MontageEntry {
        MontageEntry {
            id: EntryId::new(),
            sheet_id: SheetId::new(),
            plan_number,
            order_index: plan_number,
            start_timecode: Timecode::at_whole_second(0, start / 60, start % 60),
            end_timecode: Timecode::at_whole_second(0, end / 60, end % 60),
            plan_type: "Ср.".to_string(),
            description: desc.to_string(),
            dialogues: dialogues.to_string(),
        }
    }

    #[test]
    fn exact_duplicate_timecodes_are_dropped() {
        let entries = vec![
            entry(1, 0, 10, "герой входит в комнату", "Музыка"),
            entry(2, 0, 10, "герой входит в комнату", "Музыка"),
        ];
        let dropped = find_duplicates(&entries, 25);
        assert_eq!(dropped, vec![entries[1].id]);
    }

    #[test]
    fn distinct_entries_are_kept() {
        let entries = vec![
            entry(1, 0, 10, "герой входит в комнату", "Музыка"),
            entry(2, 11, 30, "герой садится за стол и открывает ноутбук", "Привет"),
        ];
        let dropped = find_duplicates(&entries, 25);
        assert!(dropped.is_empty());
    }

    #[test]
    fn near_duplicate_close_in_time_is_dropped() {
        let entries = vec![
            entry(1, 0, 10, "герой входит в темную комнату", "Музыка"),
            entry(2, 0, 11, "герой входит в темную комнату medленно", "Музыка"),
        ];
        let dropped = find_duplicates(&entries, 25);
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn similar_text_far_apart_in_time_is_not_collapsed() {
        let entries = vec![
            entry(1, 0, 10, "герой входит в комнату", "Музыка"),
            entry(2, 300, 310, "герой входит в комнату", "Музыка"),
        ];
        let dropped = find_duplicates(&entries, 25);
        assert!(dropped.is_empty());
    }

    #[test]
    fn dedup_is_idempotent() {
        let entries = vec![
            entry(1, 0, 10, "герой входит в комнату", "Музыка"),
            entry(2, 0, 10, "герой входит в комнату", "Музыка"),
            entry(3, 50, 70, "другая сцена совсем", "Привет, как дела"),
        ];
        let first_pass = find_duplicates(&entries, 25);
        let survivors: Vec<_> = entries.iter().filter(|e| !first_pass.contains(&e.id)).cloned().collect();
        let second_pass = find_duplicates(&survivors, 25);
        assert!(second_pass.is_empty());
    }

    #[test]
    fn jaccard_similarity_is_one_for_identical_text() {
        assert_eq!(jaccard_similarity("привет мир", "привет мир"), 1.0);
    }

    #[test]
    fn jaccard_similarity_is_zero_for_disjoint_text() {
        assert_eq!(jaccard_similarity("кот собака", "рыба птица"), 0.0);
    }

    #[test]
    fn validate_does_not_panic_on_single_entry() {
        let entries = vec![entry(1, 0, 10, "a", "b")];
        validate(&entries, 25);
    }

    #[test]
    fn validate_does_not_panic_on_empty() {
        validate(&[], 25);
    }
}
