//! Sheet finalization (C12): de-duplicate, renumber, validate pacing, and
//! mark the video complete.
//!
//! Triggered by the orchestrator once a video's completion ratio reaches
//! the finalization threshold. Idempotent: re-running against an
//! already-finalized sheet just finds nothing to drop or renumber.

use montage_models::{MontageEntry, VideoId};
use montage_persistence::repos::{EntryRepository, SheetRepository, VideoRepository};
use montage_persistence::PersistenceResult;
use tracing::info;

use crate::dedup;

/// Completion ratio at or above which a video is eligible for finalization.
pub const FINALIZE_THRESHOLD: f64 = 0.5;

pub struct Finalizer {
    video_repo: VideoRepository,
    sheet_repo: SheetRepository,
    entry_repo: EntryRepository,
}

impl Finalizer {
    pub fn new(video_repo: VideoRepository, sheet_repo: SheetRepository, entry_repo: EntryRepository) -> Self {
        Self { video_repo, sheet_repo, entry_repo }
    }

    /// Run the finalization steps for `video_id`/`fps`. On any failure, marks
    /// the video failed with the error's message and propagates the error.
    pub async fn finalize(&self, video_id: VideoId, fps: u32) -> PersistenceResult<()> {
        match self.run(video_id, fps).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.video_repo.fail(video_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn run(&self, video_id: VideoId, fps: u32) -> PersistenceResult<()> {
        let sheet = self
            .sheet_repo
            .get_by_video(video_id)
            .await?
            .ok_or_else(|| montage_persistence::PersistenceError::not_found(video_id.as_str()))?;

        let entries = self.entry_repo.list_for_sheet(sheet.id).await?;
        info!(video_id = %video_id, sheet_id = %sheet.id, count = entries.len(), "finalizing sheet");

        let dropped_ids = dedup::find_duplicates(&entries, fps);
        if !dropped_ids.is_empty() {
            let to_delete: Vec<MontageEntry> =
                entries.iter().filter(|e| dropped_ids.contains(&e.id)).cloned().collect();
            info!(video_id = %video_id, count = to_delete.len(), "dropping duplicate entries");
            self.entry_repo.delete_entries(sheet.id, &to_delete).await?;
        }

        let survivors: Vec<MontageEntry> =
            entries.into_iter().filter(|e| !dropped_ids.contains(&e.id)).collect();
        self.entry_repo.renumber(sheet.id, &survivors).await?;

        dedup::validate(&survivors, fps);

        self.video_repo.complete(video_id).await?;
        info!(video_id = %video_id, "video marked complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_one_half() {
        assert_eq!(FINALIZE_THRESHOLD, 0.5);
    }
}
