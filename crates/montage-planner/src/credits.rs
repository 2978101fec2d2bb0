//! Credits merger (C4): collapses rapid opening/closing cut sequences into
//! single long plans.

use montage_models::{seconds_to_timecode, MergedScene, SceneType};

/// Tunable thresholds. The spec calls these out as corpus-tuned constants
/// that should be configuration rather than hardcoded in a production
/// rewrite (Design Note / Open Question 1); `Default` reproduces the
/// literal values from the component design.
#[derive(Debug, Clone, Copy)]
pub struct CreditsMergerConfig {
    pub opening_window_cap_secs: f64,
    pub opening_window_fraction: f64,
    pub opening_min_cuts_in_first_90s: usize,
    pub opening_avg_ratio_trigger: f64,
    pub opening_avg_absolute_trigger_secs: f64,
    pub opening_min_elapsed_secs: f64,
    pub logo_segment_min_secs: f64,
    pub logo_segment_max_secs: f64,
    pub closing_main_region_start_secs: f64,
    pub closing_main_region_tail_fraction: f64,
    pub closing_window_len: usize,
    pub closing_low_ratio: f64,
    pub closing_high_ratio: f64,
    pub closing_stable_low_ratio: f64,
    pub closing_stable_high_ratio: f64,
    pub closing_min_interval_secs: f64,
}

impl Default for CreditsMergerConfig {
    fn default() -> Self {
        Self {
            opening_window_cap_secs: 120.0,
            opening_window_fraction: 0.15,
            opening_min_cuts_in_first_90s: 10,
            opening_avg_ratio_trigger: 1.5,
            opening_avg_absolute_trigger_secs: 2.5,
            opening_min_elapsed_secs: 30.0,
            logo_segment_min_secs: 3.0,
            logo_segment_max_secs: 8.0,
            closing_main_region_start_secs: 60.0,
            closing_main_region_tail_fraction: 0.10,
            closing_window_len: 5,
            closing_low_ratio: 0.4,
            closing_high_ratio: 2.5,
            closing_stable_low_ratio: 0.5,
            closing_stable_high_ratio: 2.0,
            closing_min_interval_secs: 15.0,
        }
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

/// Find the opening-credits end timestamp, if the first-90s eligibility
/// bar is cleared and the sliding-window ratio trips.
fn find_opening_end(cuts: &[f64], duration: f64, cfg: &CreditsMergerConfig) -> Option<f64> {
    let cuts_in_first_90s = cuts.iter().filter(|&&c| c <= 90.0).count();
    if cuts_in_first_90s < cfg.opening_min_cuts_in_first_90s {
        return None;
    }

    let window_cap = cfg.opening_window_cap_secs.min(cfg.opening_window_fraction * duration);
    let durations: Vec<f64> = cuts.windows(2).map(|w| w[1] - w[0]).collect();

    for i in 10..durations.len() {
        if cuts[i] > window_cap {
            break;
        }
        let avg_recent = mean(&durations[i - 5..i]);
        let avg_previous = mean(&durations[i - 10..i - 5]);
        if avg_previous <= 0.0 {
            continue;
        }
        let ratio_trip = avg_recent > cfg.opening_avg_ratio_trigger * avg_previous;
        let absolute_trip =
            avg_recent > cfg.opening_avg_absolute_trigger_secs && cuts[i] >= cfg.opening_min_elapsed_secs;
        if ratio_trip || absolute_trip {
            return Some(cuts[i - 1]);
        }
    }
    None
}

/// Find the closing-credits start timestamp by sliding a window backward
/// from the end and comparing it against the "main" region average.
fn find_closing_start(cuts: &[f64], duration: f64, cfg: &CreditsMergerConfig) -> Option<f64> {
    let durations: Vec<f64> = cuts.windows(2).map(|w| w[1] - w[0]).collect();
    let main_region_end = duration * (1.0 - cfg.closing_main_region_tail_fraction);

    let main_durations: Vec<f64> = cuts
        .windows(2)
        .zip(&durations)
        .filter(|((w, _), _)| w[0] >= cfg.closing_main_region_start_secs && w[1] <= main_region_end)
        .map(|(_, &d)| d)
        .collect();
    let main_avg = mean(&main_durations);
    if main_avg <= 0.0 || durations.len() < cfg.closing_window_len * 2 {
        return None;
    }

    let n = durations.len();
    let w = cfg.closing_window_len;
    // Slide window backward: window [start, start+w) for start from n-w down to w.
    let mut start = n.saturating_sub(w);
    while start >= w {
        let window_avg = mean(&durations[start..start + w]);
        let prev_avg = mean(&durations[start - w..start]);
        let window_flagged = window_avg < cfg.closing_low_ratio * main_avg
            || window_avg > cfg.closing_high_ratio * main_avg;
        let prev_stable = prev_avg >= cfg.closing_stable_low_ratio * main_avg
            && prev_avg <= cfg.closing_stable_high_ratio * main_avg;
        if window_flagged && prev_stable {
            let closing_start = cuts[start];
            if duration - closing_start >= cfg.closing_min_interval_secs {
                return Some(closing_start);
            }
        }
        if start == w {
            break;
        }
        start -= 1;
    }
    None
}

/// Collapse opening/closing rapid-cut regions of `cuts` (a sorted list of
/// raw cut timestamps spanning `[0, duration)`) into merged scenes.
///
/// When neither heuristic fires, returns the original cuts as `Regular`
/// scenes (`mergedScenes == rawScenes`, as the spec permits when the
/// caller opts out of merging or no credits are detected).
pub fn merge_credits(
    cuts: &[f64],
    duration: f64,
    fps: u32,
    cfg: &CreditsMergerConfig,
) -> Vec<MergedScene> {
    if cuts.len() < 2 {
        return Vec::new();
    }

    let opening_end = find_opening_end(cuts, duration, cfg);
    let closing_start = find_closing_start(cuts, duration, cfg);

    let mut result = Vec::new();
    let mut regular_start_idx = 0usize;
    let mut regular_end_idx = cuts.len() - 1;

    let scene = |start: f64, end: f64, scene_type: SceneType, count: u32| MergedScene {
        start_timecode: seconds_to_timecode(start, fps),
        end_timecode: seconds_to_timecode(end, fps),
        start_timestamp: start,
        end_timestamp: end,
        scene_type,
        original_scenes_count: count,
    };

    if let Some(open_end) = opening_end {
        let open_end_idx = cuts.iter().position(|&c| c >= open_end).unwrap_or(0);
        regular_start_idx = open_end_idx;

        let logo_cut = cuts
            .iter()
            .find(|&&c| c >= cfg.logo_segment_min_secs && c <= cfg.logo_segment_max_secs)
            .copied();

        match logo_cut {
            Some(logo_end) if logo_end < open_end => {
                let logo_count = cuts.iter().filter(|&&c| c > 0.0 && c <= logo_end).count() as u32;
                result.push(scene(0.0, logo_end, SceneType::OpeningCredits, logo_count.max(1)));
                let credits_count =
                    cuts.iter().filter(|&&c| c > logo_end && c <= open_end).count() as u32;
                result.push(scene(logo_end, open_end, SceneType::OpeningCredits, credits_count.max(1)));
            }
            _ => {
                let count = cuts.iter().filter(|&&c| c > 0.0 && c <= open_end).count() as u32;
                result.push(scene(0.0, open_end, SceneType::OpeningCredits, count.max(1)));
            }
        }
    }

    if let Some(close_start) = closing_start {
        let close_start_idx = cuts.iter().position(|&c| c >= close_start).unwrap_or(cuts.len() - 1);
        if close_start_idx > regular_start_idx {
            regular_end_idx = close_start_idx;
        }
    }

    for idx in regular_start_idx..regular_end_idx {
        result.push(scene(cuts[idx], cuts[idx + 1], SceneType::Regular, 1));
    }

    if let Some(close_start) = closing_start {
        if close_start > cuts[regular_end_idx] || result.last().map(|s| s.end_timestamp) != Some(duration) {
            let count = cuts.iter().filter(|&&c| c >= close_start && c < duration).count().max(1) as u32;
            result.push(scene(close_start, duration, SceneType::ClosingCredits, count));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evenly_spaced(step: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn no_merge_needed_returns_regular_scenes_covering_everything() {
        let cuts = evenly_spaced(10.0, 10); // 0,10,...,90
        let cfg = CreditsMergerConfig::default();
        let merged = merge_credits(&cuts, 90.0, 24, &cfg);
        let total: u32 = merged.iter().map(|s| s.original_scenes_count).sum();
        assert_eq!(total as usize, cuts.len() - 1);
        for w in merged.windows(2) {
            assert!(w[0].end_timestamp <= w[1].start_timestamp + 1e-6);
        }
    }

    #[test]
    fn detects_opening_credits_rapid_cuts() {
        let mut cuts: Vec<f64> = (0..22).map(|i| i as f64 * 2.5).collect(); // rapid cuts to 52.5s
        cuts.push(60.0);
        cuts.push(90.0);
        cuts.push(120.0);
        let cfg = CreditsMergerConfig::default();
        let merged = merge_credits(&cuts, 120.0, 24, &cfg);
        assert!(merged.iter().any(|s| s.scene_type == SceneType::OpeningCredits));
    }

    #[test]
    fn original_scenes_count_sums_to_raw_cut_span() {
        let cuts = evenly_spaced(3.0, 40);
        let duration = *cuts.last().unwrap();
        let cfg = CreditsMergerConfig::default();
        let merged = merge_credits(&cuts, duration, 24, &cfg);
        let total: u32 = merged.iter().map(|s| s.original_scenes_count).sum();
        assert!(total as usize >= cuts.len() - 1);
    }
}
