//! Video pipeline entry points: init, drive, and status (spec §6).

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use montage_models::{ScriptData, Video, VideoId, VideoStatus};
use montage_queue::{DriveVideoJob, InitVideoJob};

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_job_enqueued;
use crate::state::AppState;

const IDEMPOTENCY_TTL_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
pub struct InitVideoRequest {
    pub user_id: String,
    pub original_filename: String,
    pub video_url: String,
    pub video_duration: f64,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub script_data: Option<ScriptData>,
}

#[derive(Debug, Serialize)]
pub struct InitVideoResponse {
    pub video_id: VideoId,
    pub job_id: montage_models::JobId,
}

/// `POST /videos/init`: create the `Video` row and enqueue the job that
/// plans chunks, detects shot boundaries, merges credits and splits the
/// source (C2-C5, C11 `run_init`).
pub async fn init_video(
    State(state): State<AppState>,
    Json(req): Json<InitVideoRequest>,
) -> ApiResult<Json<InitVideoResponse>> {
    if req.video_url.trim().is_empty() {
        return Err(ApiError::bad_request("video_url must not be empty"));
    }
    if req.video_duration <= 0.0 {
        return Err(ApiError::bad_request("video_duration must be positive"));
    }

    let mut video = Video::new(&req.user_id, &req.original_filename, &req.video_url, req.video_duration);
    video.fps = req.fps.unwrap_or(video.fps);
    state.video_repo.create(&video).await?;

    let job = InitVideoJob::new(video.id, &req.video_url, req.video_duration).with_script_data(req.script_data);

    let acquired = state
        .queue
        .try_acquire_idempotency(&job.idempotency_key(), IDEMPOTENCY_TTL_SECS)
        .await?;
    if !acquired {
        return Err(ApiError::Conflict(format!("video {} is already being initialized", video.id)));
    }

    state.queue.enqueue_init(job.clone()).await?;
    record_job_enqueued("init");
    Ok(Json(InitVideoResponse { video_id: video.id, job_id: job.job_id }))
}

#[derive(Debug, Serialize)]
pub struct DriveVideoResponse {
    pub video_id: VideoId,
    pub job_id: montage_models::JobId,
}

/// `POST /videos/:video_id/drive`: enqueue the job that drives every
/// pending chunk through the analyzer and finalizes once ready (C11
/// `run_drive`). Safe to re-issue; the orchestrator resumes from the
/// progress document.
pub async fn drive_video(
    State(state): State<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<Json<DriveVideoResponse>> {
    let video = state
        .video_repo
        .get(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {video_id} not found")))?;
    if video.progress.is_none() {
        return Err(ApiError::bad_request(format!("video {video_id} has not been initialized yet")));
    }

    let job = DriveVideoJob::new(video_id);
    let acquired = state
        .queue
        .try_acquire_idempotency(&job.idempotency_key(), IDEMPOTENCY_TTL_SECS)
        .await?;
    if !acquired {
        return Err(ApiError::Conflict(format!("video {video_id} is already being driven")));
    }

    state.queue.enqueue_drive(job.clone()).await?;
    record_job_enqueued("drive");
    Ok(Json(DriveVideoResponse { video_id, job_id: job.job_id }))
}

#[derive(Debug, Serialize)]
pub struct VideoStatusResponse {
    pub video_id: VideoId,
    pub status: VideoStatus,
    pub total_chunks: u32,
    pub completed_chunks: u32,
    pub completion_ratio: f64,
    pub entry_count: usize,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// `GET /videos/:video_id`: current status and progress summary.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<VideoId>,
) -> ApiResult<Json<VideoStatusResponse>> {
    let video = state
        .video_repo
        .get(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {video_id} not found")))?;

    let entry_count = match state.sheet_repo.get_by_video(video_id).await? {
        Some(sheet) => state.entry_repo.list_for_sheet(sheet.id).await?.len(),
        None => 0,
    };

    let (total_chunks, completed_chunks, completion_ratio) = match &video.progress {
        Some(p) => (p.total_chunks, p.completed_chunks, p.completion_ratio()),
        None => (0, 0, 0.0),
    };

    Ok(Json(VideoStatusResponse {
        video_id,
        status: video.status,
        total_chunks,
        completed_chunks,
        completion_ratio,
        entry_count,
        error_message: video.error_message,
        created_at: video.created_at,
        completed_at: video.completed_at,
    }))
}
