//! Shared data model and timecode algebra for the montage sheet pipeline.
//!
//! This crate has no I/O. It provides:
//! - Timecode algebra (`HH:MM:SS:FF` <-> seconds/frames) (C1)
//! - The `Video` row and its status state machine
//! - The typed `ProgressDocument` (chunk windows, detected/merged scenes)
//! - The character registry (C8)
//! - `MontageSheet` / `MontageEntry`
//! - The shared `ErrorKind` classification used by every other crate

pub mod error;
pub mod ids;
pub mod progress;
pub mod registry;
pub mod sheet;
pub mod timecode;
pub mod video;

pub use error::{Classifiable, ErrorKind};
pub use ids::{EntryId, JobId, SheetId, VideoId};
pub use progress::{
    ChunkStatus, ChunkWindow, ConcurrentTransition, DetectedScene, MergedScene, ProgressDocument,
    SceneType, ScriptData, PROCESSING_VERSION,
};
pub use registry::{CharacterEntry, CharacterRegistry};
pub use sheet::{MontageEntry, MontageSheet, DEFAULT_DIALOGUES, DEFAULT_PLAN_TYPE};
pub use timecode::{
    frames_between, frames_to_timecode, seconds_to_timecode, timecode_to_frames,
    timecode_to_seconds, Timecode, TimecodeError,
};
pub use video::{Video, VideoStatus};
