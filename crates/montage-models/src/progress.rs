//! `ProgressDocument`: the authoritative, typed per-video orchestration
//! state, replacing the source's schemaless JSON map (see Design Note 2).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::SheetId;
use crate::registry::CharacterRegistry;
use crate::timecode::Timecode;

/// Current pipeline generation. Supports forward migrations of the
/// progress document's shape.
pub const PROCESSING_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("chunk {chunk_index} expected prior status {expected:?}, found {actual:?}")]
pub struct ConcurrentTransition {
    pub chunk_index: u32,
    pub expected: ChunkStatus,
    pub actual: ChunkStatus,
}

/// One fixed-length window of the source video (C2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub index: u32,
    pub start_timecode: Timecode,
    pub end_timecode: Timecode,
    pub status: ChunkStatus,
    #[serde(default)]
    pub storage_url: String,
}

impl ChunkWindow {
    pub fn new(index: u32, start_timecode: Timecode, end_timecode: Timecode) -> Self {
        Self {
            index,
            start_timecode,
            end_timecode,
            status: ChunkStatus::Pending,
            storage_url: String::new(),
        }
    }

    /// Conditional status update: aborts with [`ConcurrentTransition`] if
    /// the chunk's current status isn't `expected`. This is the in-memory
    /// mirror of the persistence layer's status-conditional document
    /// update (C10).
    pub fn transition(
        &mut self,
        expected: ChunkStatus,
        next: ChunkStatus,
    ) -> Result<(), ConcurrentTransition> {
        if self.status != expected {
            return Err(ConcurrentTransition {
                chunk_index: self.index,
                expected,
                actual: self.status,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A raw shot-boundary cut produced by the detector (C3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectedScene {
    pub timecode: Timecode,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    OpeningCredits,
    ClosingCredits,
    Regular,
}

/// A credits-merged boundary (C4 output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedScene {
    pub start_timecode: Timecode,
    pub end_timecode: Timecode,
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub scene_type: SceneType,
    pub original_scenes_count: u32,
}

/// Optional pre-supplied character list from the external script parser
/// (out of scope; consumed here only as plain data).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptData {
    pub characters: Vec<String>,
}

/// The single JSON-valued orchestration blob carried on the `Video` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressDocument {
    #[serde(default = "default_processing_version")]
    pub processing_version: u32,
    pub sheet_id: SheetId,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    pub current_chunk: u32,
    pub video_fps: u32,
    pub chunks: Vec<ChunkWindow>,
    #[serde(default)]
    pub detected_scenes: Vec<DetectedScene>,
    #[serde(default)]
    pub merged_scenes: Vec<MergedScene>,
    #[serde(default)]
    pub character_registry: CharacterRegistry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_data: Option<ScriptData>,
}

fn default_processing_version() -> u32 {
    PROCESSING_VERSION
}

impl ProgressDocument {
    pub fn new(sheet_id: SheetId, video_fps: u32, chunks: Vec<ChunkWindow>) -> Self {
        let total_chunks = chunks.len() as u32;
        Self {
            processing_version: PROCESSING_VERSION,
            sheet_id,
            total_chunks,
            completed_chunks: 0,
            current_chunk: 0,
            video_fps,
            chunks,
            detected_scenes: Vec::new(),
            merged_scenes: Vec::new(),
            character_registry: CharacterRegistry::new(),
            script_data: None,
        }
    }

    pub fn pending_chunks(&self) -> impl Iterator<Item = &ChunkWindow> {
        self.chunks.iter().filter(|c| c.status == ChunkStatus::Pending)
    }

    pub fn failed_chunks(&self) -> impl Iterator<Item = &ChunkWindow> {
        self.chunks.iter().filter(|c| c.status == ChunkStatus::Failed)
    }

    pub fn completion_ratio(&self) -> f64 {
        if self.total_chunks == 0 {
            return 1.0;
        }
        let completed = self
            .chunks
            .iter()
            .filter(|c| c.status == ChunkStatus::Completed)
            .count();
        completed as f64 / self.total_chunks as f64
    }

    /// Window for a merged scene, for C9 reconciliation: the scenes whose
    /// midpoint falls inside `[chunk.start, chunk.end)`.
    pub fn merged_scenes_in_window(&self, start: f64, end: f64) -> Vec<&MergedScene> {
        self.merged_scenes
            .iter()
            .filter(|s| s.start_timestamp < end && s.end_timestamp > start)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_rejects_unexpected_prior_status() {
        let mut chunk = ChunkWindow::new(
            0,
            Timecode::at_whole_second(0, 0, 0),
            Timecode::at_whole_second(0, 3, 0),
        );
        assert!(chunk.transition(ChunkStatus::Pending, ChunkStatus::Processing).is_ok());
        let err = chunk
            .transition(ChunkStatus::Pending, ChunkStatus::Processing)
            .unwrap_err();
        assert_eq!(err.expected, ChunkStatus::Pending);
        assert_eq!(err.actual, ChunkStatus::Processing);
    }

    #[test]
    fn completion_ratio_tracks_completed_chunks() {
        let sheet_id = SheetId::new();
        let mut doc = ProgressDocument::new(
            sheet_id,
            24,
            vec![
                ChunkWindow::new(0, Timecode::at_whole_second(0, 0, 0), Timecode::at_whole_second(0, 3, 0)),
                ChunkWindow::new(1, Timecode::at_whole_second(0, 3, 0), Timecode::at_whole_second(0, 6, 0)),
            ],
        );
        assert_eq!(doc.completion_ratio(), 0.0);
        doc.chunks[0].status = ChunkStatus::Completed;
        assert_eq!(doc.completion_ratio(), 0.5);
    }
}
