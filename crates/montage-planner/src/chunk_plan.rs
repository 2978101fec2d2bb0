//! Deterministic chunk planning (C2).

use montage_models::{seconds_to_timecode, ChunkWindow};

/// Nominal chunk length, in seconds.
pub const CHUNK_LENGTH_SECS: f64 = 180.0;

/// Windows shorter than this are absorbed into the previous window rather
/// than emitted on their own.
pub const MIN_TAIL_WINDOW_SECS: f64 = 60.0;

/// One planned window, in seconds, before timecode conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub index: u32,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Partition `duration` seconds into fixed-size, non-overlapping windows.
///
/// A video with `duration <= CHUNK_LENGTH_SECS` yields a single window. The
/// last window is absorbed into the previous one if it would otherwise be
/// shorter than [`MIN_TAIL_WINDOW_SECS`].
pub fn plan_chunks(duration: f64) -> Vec<ChunkSpan> {
    if duration <= 0.0 {
        return Vec::new();
    }
    if duration <= CHUNK_LENGTH_SECS {
        return vec![ChunkSpan { index: 0, start_secs: 0.0, end_secs: duration }];
    }

    let mut spans = Vec::new();
    let mut start = 0.0;
    let mut index = 0;
    while start < duration {
        let end = (start + CHUNK_LENGTH_SECS).min(duration);
        spans.push(ChunkSpan { index, start_secs: start, end_secs: end });
        start = end;
        index += 1;
    }

    if spans.len() >= 2 {
        let last = spans[spans.len() - 1];
        if last.end_secs - last.start_secs < MIN_TAIL_WINDOW_SECS {
            spans.pop();
            let prev = spans.last_mut().expect("at least one window remains");
            prev.end_secs = last.end_secs;
        }
    }

    spans
}

/// Render planned spans as [`ChunkWindow`]s with whole-second timecodes at
/// the given frame rate, per C1's rule that chunk boundaries carry `FF=0`.
pub fn chunk_windows(duration: f64, fps: u32) -> Vec<ChunkWindow> {
    plan_chunks(duration)
        .into_iter()
        .map(|span| {
            let start_tc = seconds_to_timecode(span.start_secs, fps);
            let end_tc = seconds_to_timecode(span.end_secs, fps);
            ChunkWindow::new(span.index, start_tc, end_tc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_window_for_short_video() {
        let spans = plan_chunks(90.0);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0], ChunkSpan { index: 0, start_secs: 0.0, end_secs: 90.0 });
    }

    #[test]
    fn absorbs_short_tail_window() {
        // 400s -> [0,180) [180,360) [360,400) but the last window (40s) is
        // shorter than the 60s floor, so it's absorbed into the previous one.
        let spans = plan_chunks(400.0);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].start_secs, 180.0);
        assert_eq!(spans[1].end_secs, 400.0);
    }

    #[test]
    fn exact_multiple_has_no_absorption() {
        let spans = plan_chunks(360.0);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].end_secs, 180.0);
        assert_eq!(spans[1].end_secs, 360.0);
    }

    #[test]
    fn windows_are_disjoint_and_cover_duration_for_many_durations() {
        for duration in [1.0, 59.0, 60.0, 179.0, 180.0, 181.0, 239.0, 240.0, 241.0, 1000.5] {
            let spans = plan_chunks(duration);
            assert!(!spans.is_empty());
            assert_eq!(spans[0].start_secs, 0.0);
            assert_eq!(spans.last().unwrap().end_secs, duration);
            for pair in spans.windows(2) {
                assert_eq!(pair[0].end_secs, pair[1].start_secs, "gap/overlap at duration {duration}");
            }
            for span in &spans {
                let len = span.end_secs - span.start_secs;
                assert!(
                    len <= 180.0 && (len == duration || len >= 60.0 - 1e-9),
                    "window length {len} out of bounds for duration {duration}"
                );
            }
        }
    }
}
