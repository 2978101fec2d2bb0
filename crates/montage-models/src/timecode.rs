//! Timecode algebra (`HH:MM:SS:FF`) at a known frame rate.
//!
//! Chunk boundaries are always emitted at whole seconds (`FF == 0`); the
//! analyzer's per-scene output is frame-accurate. This module exposes only
//! the conversions a caller needs and never guesses a frame rate on its own.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A parsed `HH:MM:SS:FF` value. Frame-rate free: `FF` is only meaningful
/// together with the frame rate used to produce or consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timecode {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimecodeError {
    #[error("invalid timecode `{0}`: expected HH:MM:SS:FF")]
    InvalidTimecode(String),
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

impl FromStr for Timecode {
    type Err = TimecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(TimecodeError::InvalidTimecode(s.to_string()));
        }
        let mut nums = [0u32; 4];
        for (i, part) in parts.iter().enumerate() {
            nums[i] = part
                .parse()
                .map_err(|_| TimecodeError::InvalidTimecode(s.to_string()))?;
        }
        Ok(Timecode {
            hours: nums[0],
            minutes: nums[1],
            seconds: nums[2],
            frames: nums[3],
        })
    }
}

impl Timecode {
    /// Construct a whole-second timecode (`FF == 0`), as emitted for chunk
    /// boundaries regardless of the analyzer's later frame-level output.
    pub fn at_whole_second(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self { hours, minutes, seconds, frames: 0 }
    }

    pub fn parse(s: &str) -> Result<Self, TimecodeError> {
        s.parse()
    }
}

/// Convert a timecode to total frames at `fps`, signed so that
/// `frames_between` can express negative spans.
pub fn timecode_to_frames(tc: &Timecode, fps: u32) -> i64 {
    let total_seconds = tc.hours as i64 * 3600 + tc.minutes as i64 * 60 + tc.seconds as i64;
    total_seconds * fps as i64 + tc.frames as i64
}

/// Inverse of [`timecode_to_frames`]: carries frames into seconds as
/// `((frames mod fps) + fps) mod fps`, matching the spec's wraparound rule
/// for (theoretically impossible, but defensively handled) negative inputs.
pub fn frames_to_timecode(frames: i64, fps: u32) -> Timecode {
    let fps_i = fps.max(1) as i64;
    let total_seconds = frames.div_euclid(fps_i);
    let f = frames.rem_euclid(fps_i);
    let hours = (total_seconds / 3600).max(0) as u32;
    let minutes = ((total_seconds % 3600) / 60).max(0) as u32;
    let seconds = (total_seconds % 60).max(0) as u32;
    Timecode { hours, minutes, seconds, frames: f as u32 }
}

/// `h*3600 + m*60 + s + f/fps`.
pub fn timecode_to_seconds(tc: &Timecode, fps: u32) -> f64 {
    let whole = (tc.hours as f64) * 3600.0 + (tc.minutes as f64) * 60.0 + tc.seconds as f64;
    whole + (tc.frames as f64) / (fps.max(1) as f64)
}

/// Inverse of [`timecode_to_seconds`]: rounds to the nearest whole frame.
pub fn seconds_to_timecode(seconds: f64, fps: u32) -> Timecode {
    let frames = (seconds * fps.max(1) as f64).round() as i64;
    frames_to_timecode(frames, fps)
}

/// Signed frame distance `b - a` at a shared frame rate.
pub fn frames_between(a: &Timecode, b: &Timecode, fps: u32) -> i64 {
    timecode_to_frames(b, fps) - timecode_to_frames(a, fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_round_trip() {
        let tc: Timecode = "01:02:03:04".parse().unwrap();
        assert_eq!(tc.to_string(), "01:02:03:04");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("01:02:03".parse::<Timecode>().is_err());
        assert!("aa:bb:cc:dd".parse::<Timecode>().is_err());
    }

    #[test]
    fn seconds_conversion_matches_spec_formula() {
        let tc = Timecode { hours: 0, minutes: 1, seconds: 5, frames: 12 };
        let fps = 24;
        let secs = timecode_to_seconds(&tc, fps);
        assert!((secs - (65.0 + 12.0 / 24.0)).abs() < 1e-9);
    }

    #[test]
    fn frame_round_trip_property() {
        let fps = 24;
        for raw in ["00:00:00:00", "00:01:30:05", "01:00:00:23", "00:00:59:23"] {
            let tc: Timecode = raw.parse().unwrap();
            let frames = timecode_to_frames(&tc, fps);
            let back = frames_to_timecode(frames, fps);
            assert_eq!(tc, back, "round trip failed for {raw}");
        }
    }

    #[test]
    fn frames_between_is_signed_and_symmetric() {
        let fps = 25;
        let a: Timecode = "00:00:01:00".parse().unwrap();
        let b: Timecode = "00:00:02:00".parse().unwrap();
        assert_eq!(frames_between(&a, &b, fps), 25);
        assert_eq!(frames_between(&b, &a, fps), -25);
    }

    #[test]
    fn whole_second_helper_has_zero_frames() {
        let tc = Timecode::at_whole_second(0, 3, 0);
        assert_eq!(tc.frames, 0);
        assert_eq!(tc.to_string(), "00:03:00:00");
    }
}
