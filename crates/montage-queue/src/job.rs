//! Job types for the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use montage_models::{JobId, ScriptData, VideoId};

/// Initializes a video for processing: plans chunks, splits, detects shot
/// boundaries, merges credits, and writes the first progress document.
///
/// This is the first step in the pipeline, entered via `POST
/// {videoId, videoUrl, videoDuration, scriptData?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Video ID
    pub video_id: VideoId,
    /// Source video URL
    pub video_url: String,
    /// Reported video duration in seconds
    pub video_duration: f64,
    /// Optional pre-supplied character list from the script parser
    pub script_data: Option<ScriptData>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl InitVideoJob {
    pub fn new(video_id: VideoId, video_url: impl Into<String>, video_duration: f64) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            video_url: video_url.into(),
            video_duration,
            script_data: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_script_data(mut self, script_data: Option<ScriptData>) -> Self {
        self.script_data = script_data;
        self
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("init:{}", self.video_id)
    }
}

/// Drives a previously initialized video through its remaining pending
/// chunks and, once the completion ratio allows it, finalizes the sheet.
///
/// Entered via `POST {videoId}`. Safe to re-issue for a video that's
/// already mid-drive; the orchestrator resumes from the progress document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Video ID
    pub video_id: VideoId,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl DriveVideoJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("drive:{}", self.video_id)
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineJob {
    /// Initialize a video: plan, split, detect, merge, persist.
    Init(InitVideoJob),
    /// Drive pending chunks through the analyzer and finalize when ready.
    Drive(DriveVideoJob),
}

impl PipelineJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            PipelineJob::Init(j) => &j.job_id,
            PipelineJob::Drive(j) => &j.job_id,
        }
    }

    pub fn video_id(&self) -> VideoId {
        match self {
            PipelineJob::Init(j) => j.video_id,
            PipelineJob::Drive(j) => j.video_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            PipelineJob::Init(j) => j.idempotency_key(),
            PipelineJob::Drive(j) => j.idempotency_key(),
        }
    }

    /// Returns true if this is the video-initialization job.
    pub fn is_init(&self) -> bool {
        matches!(self, PipelineJob::Init(_))
    }

    /// Returns true if this is a chunk-driving job.
    pub fn is_drive(&self) -> bool {
        matches!(self, PipelineJob::Drive(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_job_drive_serde_roundtrip() {
        let job = DriveVideoJob::new(VideoId::new());

        let wrapper = PipelineJob::Drive(job.clone());
        let json = serde_json::to_string(&wrapper).expect("serialize PipelineJob");
        let decoded: PipelineJob = serde_json::from_str(&json).expect("deserialize PipelineJob");

        match decoded {
            PipelineJob::Drive(j) => {
                assert_eq!(j.job_id, job.job_id);
                assert_eq!(j.video_id, job.video_id);
                assert_eq!(j.created_at, job.created_at);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn idempotency_key_is_stable_per_video_and_kind() {
        let video_id = VideoId::new();
        let init = PipelineJob::Init(InitVideoJob::new(video_id, "https://example.com/v.mp4", 120.0));
        let drive = PipelineJob::Drive(DriveVideoJob::new(video_id));

        assert_eq!(init.idempotency_key(), format!("init:{video_id}"));
        assert_eq!(drive.idempotency_key(), format!("drive:{video_id}"));
        assert_ne!(init.idempotency_key(), drive.idempotency_key());
    }
}
