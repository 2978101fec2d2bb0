#![deny(unreachable_patterns)]
//! Chunk planning, shot-boundary detection and stream-copy video splitting.
//!
//! This crate provides:
//! - Deterministic 180-second chunk planning over a video's duration (C2)
//! - A wrapper around an external shot-boundary detection tool plus smart-merge
//!   cleanup of micro-artifact cuts (C3)
//! - Opening/closing credits detection and merging (C4)
//! - Source download and stream-copy chunk splitting against object storage (C5)

pub mod chunk_plan;
pub mod command;
pub mod credits;
pub mod detector;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod splitter;

pub use chunk_plan::{chunk_windows, plan_chunks, ChunkSpan, CHUNK_LENGTH_SECS, MIN_TAIL_WINDOW_SECS};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use credits::{merge_credits, CreditsMergerConfig};
pub use detector::{detect_shots, smart_merge, DetectorConfig};
pub use download::{download_video, is_supported_url};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use splitter::{split_video_into_chunks, SplitOutcome};
