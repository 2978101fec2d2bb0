//! Per-video pipeline driver (C11): wires chunk planning, shot detection,
//! credits merging and splitting (C2-C5) into `Init`, and the per-chunk
//! analyzer loop plus finalization trigger into `Drive`.

use montage_analyzer::{build_prompt, parse_response, AnalyzerClient, AnalyzerPool};
use montage_models::{
    timecode_to_seconds, ChunkStatus, DetectedScene, MergedScene, ProgressDocument,
    VideoId,
};
use montage_persistence::repos::{EntryRepository, LockOutcome, SheetRepository, VideoRepository};
use montage_planner::{
    chunk_windows, detect_shots, download_video, merge_credits, split_video_into_chunks,
    CreditsMergerConfig, DetectorConfig, MediaError,
};
use montage_queue::{DriveVideoJob, InitVideoJob};
use montage_storage::ObjectStoreClient;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};
use crate::finalizer::{Finalizer, FINALIZE_THRESHOLD};
use crate::reconciler;
use crate::registry;

/// Chunks allowed to fail before a video is given up on for good (spec C11).
pub const MAX_CHUNK_RETRIES: u32 = 5;

pub struct Orchestrator {
    video_repo: VideoRepository,
    sheet_repo: SheetRepository,
    entry_repo: EntryRepository,
    storage: ObjectStoreClient,
    analyzer_pool: AnalyzerPool,
    analyzer_client: AnalyzerClient,
    finalizer: Finalizer,
    detector_config: DetectorConfig,
    credits_config: CreditsMergerConfig,
    max_chunk_retries: u32,
}

impl Orchestrator {
    pub fn new(
        video_repo: VideoRepository,
        sheet_repo: SheetRepository,
        entry_repo: EntryRepository,
        storage: ObjectStoreClient,
        analyzer_pool: AnalyzerPool,
        analyzer_client: AnalyzerClient,
    ) -> Self {
        let finalizer = Finalizer::new(video_repo.clone(), sheet_repo.clone(), entry_repo.clone());
        Self {
            video_repo,
            sheet_repo,
            entry_repo,
            storage,
            analyzer_pool,
            analyzer_client,
            finalizer,
            detector_config: DetectorConfig::default(),
            credits_config: CreditsMergerConfig::default(),
            max_chunk_retries: MAX_CHUNK_RETRIES,
        }
    }

    /// Plan chunks, detect shot boundaries, merge credits and split the
    /// source video, writing the first progress document (C2-C5).
    pub async fn run_init(&self, job: &InitVideoJob) -> WorkerResult<()> {
        let video_id = job.video_id;
        let video = self
            .video_repo
            .get(video_id)
            .await?
            .ok_or_else(|| WorkerError::job_failed(format!("video {video_id} not found")))?;

        self.video_repo.start(video_id).await?;
        let sheet = self
            .sheet_repo
            .get_or_create(video_id, &video.user_id, &video.original_filename)
            .await?;

        let chunks = chunk_windows(job.video_duration, video.fps);

        let scratch = std::env::temp_dir().join(format!("montage-detect-{}", Uuid::new_v4()));
        let detect_result = download_video(&job.video_url, &scratch)
            .await
            .map_err(WorkerError::from);
        let cuts: Vec<f64> = match detect_result {
            Ok(()) => {
                let shots = detect_shots(&scratch, job.video_duration, video.fps, &self.detector_config).await;
                let cuts = match shots {
                    Ok(scenes) => scenes.into_iter().map(|s| s.timestamp).collect(),
                    Err(MediaError::DetectorUnavailable) => {
                        warn!(video_id = %video_id, "shot detector unavailable, treating video as one scene");
                        vec![0.0, job.video_duration]
                    }
                    Err(e) => return Err(e.into()),
                };
                let _ = tokio::fs::remove_file(&scratch).await;
                cuts
            }
            Err(e) => {
                warn!(video_id = %video_id, error = %e, "source download for shot detection failed, treating video as one scene");
                vec![0.0, job.video_duration]
            }
        };

        let detected_scenes: Vec<DetectedScene> = cuts
            .iter()
            .map(|&ts| DetectedScene { timecode: montage_models::seconds_to_timecode(ts, video.fps), timestamp: ts })
            .collect();
        let merged_scenes = merge_credits(&cuts, job.video_duration, video.fps, &self.credits_config);

        let mut progress = ProgressDocument::new(sheet.id, video.fps, chunks);
        progress.detected_scenes = detected_scenes;
        progress.merged_scenes = merged_scenes;
        if let Some(script) = &job.script_data {
            progress.script_data = Some(script.clone());
        }

        let outcome = {
            let progress = progress.clone();
            self.video_repo.init_or_get_progress(video_id, move || progress).await?
        };

        if let LockOutcome::Initialized(initialized) = outcome {
            let split_outcome = split_video_into_chunks(
                &self.storage,
                &job.video_url,
                &video.user_id,
                initialized.chunks.clone(),
                video.fps,
            )
            .await?;
            let mut updated = initialized;
            updated.chunks = split_outcome.windows;
            self.video_repo.write_progress(video_id, &updated, None).await?;
            info!(video_id = %video_id, chunks = updated.total_chunks, "video initialized and split");
        } else {
            info!(video_id = %video_id, "video already initialized by another worker");
        }

        Ok(())
    }

    /// Drive every pending chunk through the analyzer, retry failed chunks
    /// once (up to [`MAX_CHUNK_RETRIES`]), then finalize if the completion
    /// ratio allows it (C9/C11/C12).
    pub async fn run_drive(&self, job: &DriveVideoJob) -> WorkerResult<()> {
        let video_id = job.video_id;
        let video = self
            .video_repo
            .get(video_id)
            .await?
            .ok_or_else(|| WorkerError::job_failed(format!("video {video_id} not found")))?;
        let fps = video.fps;
        let progress = video
            .progress
            .ok_or_else(|| WorkerError::job_failed(format!("video {video_id} has no progress document")))?;

        let pending: Vec<u32> = progress.pending_chunks().map(|c| c.index).collect();
        for chunk_index in pending {
            if let Err(e) = self.drive_chunk(video_id, chunk_index, fps).await {
                warn!(video_id = %video_id, chunk_index, error = %e, "chunk processing failed");
            }
        }

        let after_first_pass = self.current_progress(video_id).await?;
        let failed: Vec<u32> = after_first_pass.failed_chunks().map(|c| c.index).collect();

        if !failed.is_empty() {
            if failed.len() as u32 > self.max_chunk_retries {
                let msg = format!(
                    "{} of {} chunks failed, exceeding the retry cap of {}",
                    failed.len(),
                    after_first_pass.total_chunks,
                    self.max_chunk_retries
                );
                self.video_repo.fail(video_id, &msg).await?;
                return Err(WorkerError::TooManyRetries(msg));
            }
            for chunk_index in failed {
                self.video_repo
                    .transition_chunk(video_id, chunk_index, ChunkStatus::Failed, ChunkStatus::Pending)
                    .await?;
                if let Err(e) = self.drive_chunk(video_id, chunk_index, fps).await {
                    warn!(video_id = %video_id, chunk_index, error = %e, "chunk retry failed");
                }
            }
        }

        let final_progress = self.current_progress(video_id).await?;
        let still_failed = final_progress.failed_chunks().count();
        if still_failed > 0 {
            warn!(
                video_id = %video_id,
                still_failed,
                "chunks still failed after retry, proceeding with a sparse sheet"
            );
        }

        if final_progress.completion_ratio() >= FINALIZE_THRESHOLD {
            self.finalizer.finalize(video_id, fps).await?;
            return Ok(());
        }

        let msg = format!(
            "completion ratio {:.2} stayed below the finalize threshold of {:.2}",
            final_progress.completion_ratio(),
            FINALIZE_THRESHOLD
        );
        self.video_repo.fail(video_id, &msg).await?;
        Err(WorkerError::job_failed(msg))
    }

    async fn current_progress(&self, video_id: VideoId) -> WorkerResult<ProgressDocument> {
        let video = self
            .video_repo
            .get(video_id)
            .await?
            .ok_or_else(|| WorkerError::job_failed(format!("video {video_id} not found")))?;
        video
            .progress
            .ok_or_else(|| WorkerError::job_failed(format!("video {video_id} has no progress document")))
    }

    /// The six-step per-chunk loop (C9/C11): acquire an analyzer handle,
    /// call it, reconcile the response against the detector's boundaries,
    /// insert entries, fold speakers into the registry, and transition the
    /// chunk to its terminal status.
    async fn drive_chunk(&self, video_id: VideoId, chunk_index: u32, fps: u32) -> WorkerResult<()> {
        let progress = self
            .video_repo
            .transition_chunk(video_id, chunk_index, ChunkStatus::Pending, ChunkStatus::Processing)
            .await?;
        let chunk = progress
            .chunks
            .iter()
            .find(|c| c.index == chunk_index)
            .cloned()
            .ok_or_else(|| WorkerError::job_failed(format!("chunk {chunk_index} vanished from progress document")))?;

        let chunk_start = timecode_to_seconds(chunk.start_timecode, fps);
        let chunk_end = timecode_to_seconds(chunk.end_timecode, fps);
        let boundaries: Vec<MergedScene> = progress
            .merged_scenes_in_window(chunk_start, chunk_end)
            .into_iter()
            .cloned()
            .collect();
        let registry_snapshot = progress.character_registry.render_snapshot();
        let prompt = build_prompt(&boundaries, chunk_index, progress.total_chunks, &registry_snapshot);

        match self.call_analyzer(&chunk.storage_url, &prompt).await {
            Ok(text) => {
                let parsed = parse_response(&text);
                let drafts = reconciler::reconcile(&parsed, &boundaries, chunk_start, chunk_end, fps);
                let inserted = self.entry_repo.insert_entries(progress.sheet_id, drafts).await?;

                let mut updated = self
                    .video_repo
                    .transition_chunk(video_id, chunk_index, ChunkStatus::Processing, ChunkStatus::Completed)
                    .await?;
                for entry in &inserted {
                    registry::record_speakers(
                        &mut updated.character_registry,
                        &entry.dialogues,
                        chunk_index,
                        entry.start_timecode,
                        updated.script_data.as_ref(),
                    );
                }
                self.video_repo.write_progress(video_id, &updated, None).await?;
                info!(video_id = %video_id, chunk_index, entries = inserted.len(), "chunk completed");
                Ok(())
            }
            Err(e) => {
                self.video_repo
                    .transition_chunk(video_id, chunk_index, ChunkStatus::Processing, ChunkStatus::Failed)
                    .await?;
                Err(e)
            }
        }
    }

    async fn call_analyzer(&self, video_url: &str, prompt: &str) -> WorkerResult<String> {
        let key = self.analyzer_pool.acquire().await?;
        let result = async {
            let id = self.analyzer_client.create_prediction_with_retry(&key, video_url, prompt).await?;
            self.analyzer_client.poll_prediction(&key, &id).await
        }
        .await;

        match &result {
            Ok(_) => self.analyzer_pool.mark_success(&key).await,
            Err(e) => self.analyzer_pool.mark_error(&key, &e.to_string()).await,
        }
        self.analyzer_pool.release(&key).await;
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_chunk_retries_matches_spec_cap() {
        assert_eq!(MAX_CHUNK_RETRIES, 5);
    }
}
