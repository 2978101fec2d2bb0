//! The `Video` row and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::VideoId;
use crate::progress::ProgressDocument;

/// Coarse video lifecycle status. Mutated only by the core pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

/// A video row. Created once at upload-complete; destroyed by user action,
/// which cascades to its sheet and entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub user_id: String,
    pub original_filename: String,
    pub source_storage_path: String,
    pub duration_secs: f64,
    #[serde(default = "default_fps")]
    pub fps: u32,
    pub status: VideoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressDocument>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_fps() -> u32 {
    24
}

impl Video {
    pub fn new(
        user_id: impl Into<String>,
        original_filename: impl Into<String>,
        source_storage_path: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: VideoId::new(),
            user_id: user_id.into(),
            original_filename: original_filename.into(),
            source_storage_path: source_storage_path.into(),
            duration_secs,
            fps: default_fps(),
            status: VideoStatus::Uploaded,
            error_message: None,
            progress: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Consuming transition: `uploaded`/`failed` -> `processing`.
    pub fn start(mut self) -> Self {
        self.status = VideoStatus::Processing;
        self.error_message = None;
        self
    }

    /// Consuming transition: `processing` -> `completed`.
    pub fn complete(mut self) -> Self {
        self.status = VideoStatus::Completed;
        self.completed_at = Some(Utc::now());
        self
    }

    /// Consuming transition: any -> `failed`, with a human-readable reason.
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.status = VideoStatus::Failed;
        self.error_message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_set_expected_status() {
        let v = Video::new("u1", "a.mp4", "src/a.mp4", 120.0);
        assert_eq!(v.status, VideoStatus::Uploaded);
        let v = v.start();
        assert_eq!(v.status, VideoStatus::Processing);
        let v = v.clone().complete();
        assert_eq!(v.status, VideoStatus::Completed);
        assert!(v.completed_at.is_some());
        let failed = v.fail("boom");
        assert_eq!(failed.status, VideoStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
    }
}
