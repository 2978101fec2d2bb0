//! Video splitter (C5): downloads the source video once, stream-copies each
//! planned chunk window out to its own file, and uploads the chunks to
//! object storage.

use std::path::Path;
use std::time::Duration;

use montage_models::ChunkWindow;
use montage_storage::{ObjectStoreClient, StorageError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::download::download_video;
use crate::error::{MediaError, MediaResult};

/// Chunks are uploaded in batches this large, bounding concurrent ffmpeg and
/// network load against a single source video.
const UPLOAD_BATCH_SIZE: usize = 2;

/// Upload attempts per chunk before giving up.
const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Base delay for the upload retry backoff; attempt `n` (1-indexed) waits
/// `RETRY_BASE_SECS * 2^(n-1)` seconds.
const RETRY_BASE_SECS: u64 = 2;

/// Presigned chunk URLs are valid for at least this long, so the analyzer
/// has headroom to fetch a chunk well after it was cut.
const CHUNK_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of splitting a source video into its planned chunks: each window
/// now carries a `storage_url` pointing at its uploaded chunk file.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub windows: Vec<ChunkWindow>,
}

/// Download `video_url` to scratch space, cut it into `windows` via
/// stream-copy, and upload each chunk to object storage under
/// `{user_id}/chunks/{chunk_index}_{nonce}.mp4`.
///
/// Scratch files are always cleaned up, whether the split succeeds or
/// fails partway through.
pub async fn split_video_into_chunks(
    storage: &ObjectStoreClient,
    video_url: &str,
    user_id: &str,
    windows: Vec<ChunkWindow>,
    fps: u32,
) -> MediaResult<SplitOutcome> {
    let scratch_dir = std::env::temp_dir().join(format!("montage-split-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&scratch_dir).await?;

    let result = split_in_scratch(storage, video_url, user_id, windows, fps, &scratch_dir).await;

    if let Err(e) = tokio::fs::remove_dir_all(&scratch_dir).await {
        warn!(error = %e, path = %scratch_dir.display(), "failed to clean up splitter scratch dir");
    }

    result
}

async fn split_in_scratch(
    storage: &ObjectStoreClient,
    video_url: &str,
    user_id: &str,
    mut windows: Vec<ChunkWindow>,
    fps: u32,
    scratch_dir: &Path,
) -> MediaResult<SplitOutcome> {
    let source_path = scratch_dir.join("source.mp4");
    download_video(video_url, &source_path).await?;

    let batches: Vec<Vec<ChunkWindow>> = windows
        .chunks(UPLOAD_BATCH_SIZE)
        .map(|b| b.to_vec())
        .collect();

    for batch in batches {
        let mut handles = Vec::with_capacity(batch.len());
        for window in batch {
            let source_path = source_path.clone();
            let scratch_dir = scratch_dir.to_path_buf();
            let storage = storage.clone();
            let user_id = user_id.to_string();
            handles.push(tokio::spawn(async move {
                split_one_chunk(&source_path, &scratch_dir, &storage, &user_id, window, fps).await
            }));
        }
        for handle in handles {
            let window = handle
                .await
                .map_err(|e| MediaError::internal(format!("chunk split task panicked: {e}")))??;
            if let Some(existing) = windows.iter_mut().find(|w| w.index == window.index) {
                *existing = window;
            }
        }
    }

    Ok(SplitOutcome { windows })
}

async fn split_one_chunk(
    source_path: &Path,
    scratch_dir: &Path,
    storage: &ObjectStoreClient,
    user_id: &str,
    mut window: ChunkWindow,
    fps: u32,
) -> MediaResult<ChunkWindow> {
    let start_secs = montage_models::timecode_to_seconds(&window.start_timecode, fps);
    let end_secs = montage_models::timecode_to_seconds(&window.end_timecode, fps);

    let chunk_path = scratch_dir.join(format!("chunk-{}.mp4", window.index));
    let cmd = FfmpegCommand::new(source_path, &chunk_path)
        .seek(start_secs)
        .duration(end_secs - start_secs)
        .video_codec("copy")
        .audio_codec("copy");

    let runner = FfmpegRunner::new();
    runner.run(&cmd).await?;

    let key = upload_chunk_with_retry(storage, user_id, window.index, &chunk_path).await?;
    window.storage_url = storage.presign_get(&key, CHUNK_URL_TTL).await?;
    info!(chunk_index = window.index, key = %key, "uploaded chunk");
    Ok(window)
}

/// Upload a chunk file with up to [`MAX_UPLOAD_ATTEMPTS`] attempts and
/// exponential backoff, returning the object key. An
/// [`StorageError::AlreadyExists`] on a retry is treated as success, since a
/// prior attempt may have uploaded before a transient failure on the
/// response path.
async fn upload_chunk_with_retry(
    storage: &ObjectStoreClient,
    user_id: &str,
    chunk_index: u32,
    chunk_path: &Path,
) -> MediaResult<String> {
    let key = format!("{}/chunks/{}_{}.mp4", user_id, chunk_index, Uuid::new_v4());

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match storage.upload_file(chunk_path, &key, "video/mp4").await {
            Ok(()) => return Ok(key),
            Err(StorageError::AlreadyExists(_)) => return Ok(key),
            Err(e) if attempt >= MAX_UPLOAD_ATTEMPTS => return Err(MediaError::from(e)),
            Err(e) => {
                let delay = RETRY_BASE_SECS * 2u64.pow(attempt - 1);
                warn!(
                    chunk_index,
                    attempt,
                    error = %e,
                    "chunk upload failed, retrying in {}s",
                    delay
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_key_is_namespaced_by_user_and_chunk_index() {
        let key = format!("{}/chunks/{}_{}.mp4", "user-1", 3, Uuid::new_v4());
        assert!(key.starts_with("user-1/chunks/3_"));
    }
}
