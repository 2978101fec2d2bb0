//! Typed repositories for videos, sheets and entries (C10).
//!
//! The document store has no native query-by-field or unique-secondary-index
//! support, so two application-level conventions carry weight here:
//! - A sheet's document ID is its video's ID, making sheet creation
//!   trivially idempotent (`get_or_create` is just `get`-then-`create`).
//! - An entry's document ID is derived from `(sheet_id, plan_number)`, so a
//!   colliding insert surfaces as a natural `AlreadyExists`/`CONFLICT`
//!   instead of requiring a real unique index.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use montage_models::{
    ChunkStatus, ConcurrentTransition, EntryId, MontageEntry, MontageSheet,
    ProgressDocument, SheetId, Video, VideoId, VideoStatus,
};

use crate::client::DocumentStoreClient;
use crate::error::{PersistenceError, PersistenceResult};
use crate::types::{Document, FromFirestoreValue, ToFirestoreValue, Value, Write};

const VIDEOS_COLLECTION: &str = "videos";
const SHEETS_COLLECTION: &str = "sheets";
const DELETE_BATCH_SIZE: usize = 100;

fn video_status_to_str(status: VideoStatus) -> &'static str {
    match status {
        VideoStatus::Uploaded => "uploaded",
        VideoStatus::Processing => "processing",
        VideoStatus::Completed => "completed",
        VideoStatus::Failed => "failed",
    }
}

fn video_status_from_str(s: &str) -> Option<VideoStatus> {
    match s {
        "uploaded" => Some(VideoStatus::Uploaded),
        "processing" => Some(VideoStatus::Processing),
        "completed" => Some(VideoStatus::Completed),
        "failed" => Some(VideoStatus::Failed),
        _ => None,
    }
}

fn video_to_fields(video: &Video) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("user_id".to_string(), video.user_id.to_firestore_value());
    fields.insert(
        "original_filename".to_string(),
        video.original_filename.to_firestore_value(),
    );
    fields.insert(
        "source_storage_path".to_string(),
        video.source_storage_path.to_firestore_value(),
    );
    fields.insert("duration_secs".to_string(), video.duration_secs.to_firestore_value());
    fields.insert("fps".to_string(), video.fps.to_firestore_value());
    fields.insert(
        "status".to_string(),
        video_status_to_str(video.status).to_firestore_value(),
    );
    fields.insert(
        "error_message".to_string(),
        video.error_message.clone().to_firestore_value(),
    );
    let progress_json = video
        .progress
        .as_ref()
        .map(|p| serde_json::to_string(p).unwrap_or_default());
    fields.insert("progress".to_string(), progress_json.to_firestore_value());
    fields.insert("created_at".to_string(), video.created_at.to_firestore_value());
    fields.insert("completed_at".to_string(), video.completed_at.to_firestore_value());
    fields
}

fn document_to_video(doc: &Document, id: VideoId) -> PersistenceResult<Video> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| PersistenceError::InvalidResponse("video document has no fields".to_string()))?;

    let get_str = |key: &str| -> Option<String> { fields.get(key).and_then(String::from_firestore_value) };

    let status_str = get_str("status").ok_or_else(|| {
        PersistenceError::InvalidResponse(format!("video {id} missing status field"))
    })?;
    let status = video_status_from_str(&status_str)
        .ok_or_else(|| PersistenceError::InvalidResponse(format!("video {id} has unknown status {status_str}")))?;

    let progress = match fields.get("progress").and_then(String::from_firestore_value) {
        Some(json) if !json.is_empty() => Some(
            serde_json::from_str::<ProgressDocument>(&json)
                .map_err(|e| PersistenceError::InvalidResponse(format!("corrupt progress document: {e}")))?,
        ),
        _ => None,
    };

    Ok(Video {
        id,
        user_id: get_str("user_id").unwrap_or_default(),
        original_filename: get_str("original_filename").unwrap_or_default(),
        source_storage_path: get_str("source_storage_path").unwrap_or_default(),
        duration_secs: fields.get("duration_secs").and_then(f64::from_firestore_value).unwrap_or(0.0),
        fps: fields.get("fps").and_then(u32::from_firestore_value).unwrap_or(24),
        status,
        error_message: get_str("error_message"),
        progress,
        created_at: fields
            .get("created_at")
            .and_then(chrono::DateTime::<Utc>::from_firestore_value)
            .unwrap_or_else(Utc::now),
        completed_at: fields.get("completed_at").and_then(chrono::DateTime::<Utc>::from_firestore_value),
    })
}

/// Outcome of racing to initialize a video's progress document.
#[derive(Debug, Clone)]
pub enum LockOutcome {
    /// This call won the race and wrote the fresh progress document.
    Initialized(ProgressDocument),
    /// Another worker had already initialized it; this is its current state.
    AlreadyInitialized(ProgressDocument),
}

impl LockOutcome {
    pub fn into_progress(self) -> ProgressDocument {
        match self {
            LockOutcome::Initialized(p) | LockOutcome::AlreadyInitialized(p) => p,
        }
    }
}

/// Repository for video rows.
#[derive(Clone)]
pub struct VideoRepository {
    client: DocumentStoreClient,
}

impl VideoRepository {
    pub fn new(client: DocumentStoreClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, video_id: VideoId) -> PersistenceResult<Option<Video>> {
        let doc = self.client.get_document(VIDEOS_COLLECTION, &video_id.as_str()).await?;
        doc.map(|d| document_to_video(&d, video_id)).transpose()
    }

    pub async fn create(&self, video: &Video) -> PersistenceResult<()> {
        let fields = video_to_fields(video);
        self.client
            .create_document(VIDEOS_COLLECTION, &video.id.as_str(), fields)
            .await?;
        info!(video_id = %video.id, "created video record");
        Ok(())
    }

    /// Set `status = processing`, the first step before a worker attempts
    /// the progress-document initialization lock.
    pub async fn start(&self, video_id: VideoId) -> PersistenceResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "status".to_string(),
            video_status_to_str(VideoStatus::Processing).to_firestore_value(),
        );
        self.client
            .update_document(VIDEOS_COLLECTION, &video_id.as_str(), fields, Some(vec!["status".to_string()]))
            .await?;
        Ok(())
    }

    /// The initialization lock (spec C10): the first worker to arrive
    /// conditionally writes a fresh progress document iff the video has
    /// none yet; a losing worker reads back whatever the winner wrote.
    pub async fn init_or_get_progress(
        &self,
        video_id: VideoId,
        build: impl FnOnce() -> ProgressDocument,
    ) -> PersistenceResult<LockOutcome> {
        let doc = self
            .client
            .get_document(VIDEOS_COLLECTION, &video_id.as_str())
            .await?
            .ok_or_else(|| PersistenceError::not_found(video_id.as_str()))?;
        let video = document_to_video(&doc, video_id)?;

        if let Some(existing) = video.progress {
            return Ok(LockOutcome::AlreadyInitialized(existing));
        }

        let progress = build();
        let progress_json = serde_json::to_string(&progress)
            .map_err(|e| PersistenceError::InvalidResponse(format!("failed to serialize progress document: {e}")))?;

        let mut fields = HashMap::new();
        fields.insert("progress".to_string(), progress_json.to_firestore_value());

        let result = self
            .client
            .update_document_with_precondition(
                VIDEOS_COLLECTION,
                &video_id.as_str(),
                fields,
                Some(vec!["progress".to_string()]),
                doc.update_time.as_deref(),
            )
            .await;

        match result {
            Ok(_) => Ok(LockOutcome::Initialized(progress)),
            Err(e) if e.is_precondition_failed() => {
                warn!(video_id = %video_id, "lost the progress-document init race, reading winner's state");
                let doc = self
                    .client
                    .get_document(VIDEOS_COLLECTION, &video_id.as_str())
                    .await?
                    .ok_or_else(|| PersistenceError::not_found(video_id.as_str()))?;
                let video = document_to_video(&doc, video_id)?;
                video
                    .progress
                    .map(LockOutcome::AlreadyInitialized)
                    .ok_or_else(|| PersistenceError::InvalidResponse(
                        "lost progress-document init race but winner's progress document is still missing".to_string(),
                    ))
            }
            Err(e) => Err(e),
        }
    }

    /// Conditional chunk-status transition (C10/C11 step 2/6): reads the
    /// current progress document, applies the in-memory transition (which
    /// itself rejects an unexpected prior status), and persists the result
    /// guarded by the document's `updateTime` so two writers can't silently
    /// clobber each other.
    pub async fn transition_chunk(
        &self,
        video_id: VideoId,
        chunk_index: u32,
        expected: ChunkStatus,
        next: ChunkStatus,
    ) -> PersistenceResult<ProgressDocument> {
        let doc = self
            .client
            .get_document(VIDEOS_COLLECTION, &video_id.as_str())
            .await?
            .ok_or_else(|| PersistenceError::not_found(video_id.as_str()))?;
        let video = document_to_video(&doc, video_id)?;
        let mut progress = video
            .progress
            .ok_or_else(|| PersistenceError::InvalidResponse(format!("video {video_id} has no progress document")))?;

        let chunk = progress
            .chunks
            .iter_mut()
            .find(|c| c.index == chunk_index)
            .ok_or_else(|| PersistenceError::InvalidResponse(format!("chunk {chunk_index} not found")))?;
        chunk.transition(expected, next)?;
        if next == ChunkStatus::Completed {
            progress.completed_chunks += 1;
        }

        self.write_progress(video_id, &progress, doc.update_time.as_deref()).await?;
        Ok(progress)
    }

    /// Unconditional progress-document write, used for registry snapshots
    /// and other updates that aren't chunk-status transitions.
    pub async fn write_progress(
        &self,
        video_id: VideoId,
        progress: &ProgressDocument,
        update_time: Option<&str>,
    ) -> PersistenceResult<()> {
        let progress_json = serde_json::to_string(progress)
            .map_err(|e| PersistenceError::InvalidResponse(format!("failed to serialize progress document: {e}")))?;
        let mut fields = HashMap::new();
        fields.insert("progress".to_string(), progress_json.to_firestore_value());

        let result = self
            .client
            .update_document_with_precondition(
                VIDEOS_COLLECTION,
                &video_id.as_str(),
                fields,
                Some(vec!["progress".to_string()]),
                update_time,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_precondition_failed() => {
                let doc = self
                    .client
                    .get_document(VIDEOS_COLLECTION, &video_id.as_str())
                    .await?
                    .ok_or_else(|| PersistenceError::not_found(video_id.as_str()))?;
                let actual = document_to_video(&doc, video_id)?
                    .progress
                    .and_then(|p| p.chunks.first().map(|c| c.status))
                    .unwrap_or(ChunkStatus::Pending);
                Err(PersistenceError::ConcurrentTransition(ConcurrentTransition {
                    chunk_index: progress.current_chunk,
                    expected: ChunkStatus::Processing,
                    actual,
                }))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn complete(&self, video_id: VideoId) -> PersistenceResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "status".to_string(),
            video_status_to_str(VideoStatus::Completed).to_firestore_value(),
        );
        fields.insert("completed_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                VIDEOS_COLLECTION,
                &video_id.as_str(),
                fields,
                Some(vec!["status".to_string(), "completed_at".to_string()]),
            )
            .await?;
        Ok(())
    }

    pub async fn fail(&self, video_id: VideoId, reason: &str) -> PersistenceResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "status".to_string(),
            video_status_to_str(VideoStatus::Failed).to_firestore_value(),
        );
        fields.insert("error_message".to_string(), reason.to_firestore_value());
        self.client
            .update_document(
                VIDEOS_COLLECTION,
                &video_id.as_str(),
                fields,
                Some(vec!["status".to_string(), "error_message".to_string()]),
            )
            .await?;
        Ok(())
    }
}

fn sheet_to_fields(sheet: &MontageSheet) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("sheet_id".to_string(), sheet.id.as_str().to_firestore_value());
    fields.insert("video_id".to_string(), sheet.video_id.as_str().to_firestore_value());
    fields.insert("user_id".to_string(), sheet.user_id.to_firestore_value());
    fields.insert("title".to_string(), sheet.title.to_firestore_value());
    fields
}

fn document_to_sheet(doc: &Document) -> PersistenceResult<MontageSheet> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| PersistenceError::InvalidResponse("sheet document has no fields".to_string()))?;
    let get_str = |key: &str| fields.get(key).and_then(String::from_firestore_value);

    let id: SheetId = get_str("sheet_id")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PersistenceError::InvalidResponse("sheet document missing sheet_id".to_string()))?;
    let video_id: VideoId = get_str("video_id")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PersistenceError::InvalidResponse("sheet document missing video_id".to_string()))?;

    Ok(MontageSheet {
        id,
        video_id,
        user_id: get_str("user_id").unwrap_or_default(),
        title: get_str("title").unwrap_or_default(),
    })
}

/// Repository for montage sheets. A sheet's document ID equals its video's
/// ID, which is what makes `get_or_create` idempotent without a query API.
#[derive(Clone)]
pub struct SheetRepository {
    client: DocumentStoreClient,
}

impl SheetRepository {
    pub fn new(client: DocumentStoreClient) -> Self {
        Self { client }
    }

    pub async fn get_by_video(&self, video_id: VideoId) -> PersistenceResult<Option<MontageSheet>> {
        let doc = self.client.get_document(SHEETS_COLLECTION, &video_id.as_str()).await?;
        doc.as_ref().map(document_to_sheet).transpose()
    }

    /// Create a sheet for `video_id` if one doesn't already exist, returning
    /// the existing sheet otherwise (spec: "sheet creation is idempotent").
    pub async fn get_or_create(&self, video_id: VideoId, user_id: &str, title: &str) -> PersistenceResult<MontageSheet> {
        if let Some(existing) = self.get_by_video(video_id).await? {
            return Ok(existing);
        }

        let sheet = MontageSheet::new(video_id, user_id, title);
        let fields = sheet_to_fields(&sheet);

        match self.client.create_document(SHEETS_COLLECTION, &video_id.as_str(), fields).await {
            Ok(_) => Ok(sheet),
            Err(PersistenceError::AlreadyExists(_)) => self
                .get_by_video(video_id)
                .await?
                .ok_or_else(|| PersistenceError::InvalidResponse("sheet creation lost a race but no sheet exists".to_string())),
            Err(e) => Err(e),
        }
    }
}

fn entries_collection(sheet_id: SheetId) -> String {
    format!("sheets/{}/entries", sheet_id.as_str())
}

fn entry_doc_id(sheet_id: SheetId, plan_number: u32) -> String {
    format!("{}_{}", sheet_id.as_str(), plan_number)
}

fn entry_to_fields(entry: &MontageEntry) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("entry_id".to_string(), entry.id.as_str().to_firestore_value());
    fields.insert("sheet_id".to_string(), entry.sheet_id.as_str().to_firestore_value());
    fields.insert("plan_number".to_string(), entry.plan_number.to_firestore_value());
    fields.insert("order_index".to_string(), entry.order_index.to_firestore_value());
    fields.insert("start_timecode".to_string(), entry.start_timecode.to_string().to_firestore_value());
    fields.insert("end_timecode".to_string(), entry.end_timecode.to_string().to_firestore_value());
    fields.insert("plan_type".to_string(), entry.plan_type.to_firestore_value());
    fields.insert("description".to_string(), entry.description.to_firestore_value());
    fields.insert("dialogues".to_string(), entry.dialogues.to_firestore_value());
    fields
}

fn document_to_entry(doc: &Document, sheet_id: SheetId) -> PersistenceResult<MontageEntry> {
    let fields = doc
        .fields
        .as_ref()
        .ok_or_else(|| PersistenceError::InvalidResponse("entry document has no fields".to_string()))?;
    let get_str = |key: &str| fields.get(key).and_then(String::from_firestore_value);

    let id: EntryId = get_str("entry_id")
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PersistenceError::InvalidResponse("entry document missing entry_id".to_string()))?;
    let start_timecode = get_str("start_timecode")
        .and_then(|s| montage_models::Timecode::parse(&s).ok())
        .ok_or_else(|| PersistenceError::InvalidResponse("entry document missing start_timecode".to_string()))?;
    let end_timecode = get_str("end_timecode")
        .and_then(|s| montage_models::Timecode::parse(&s).ok())
        .ok_or_else(|| PersistenceError::InvalidResponse("entry document missing end_timecode".to_string()))?;

    Ok(MontageEntry {
        id,
        sheet_id,
        plan_number: fields.get("plan_number").and_then(u32::from_firestore_value).unwrap_or(0),
        order_index: fields.get("order_index").and_then(u32::from_firestore_value).unwrap_or(0),
        start_timecode,
        end_timecode,
        plan_type: get_str("plan_type").unwrap_or_else(|| montage_models::DEFAULT_PLAN_TYPE.to_string()),
        description: get_str("description").unwrap_or_default(),
        dialogues: get_str("dialogues").unwrap_or_else(|| montage_models::DEFAULT_DIALOGUES.to_string()),
    })
}

/// Draft entry data, not yet numbered; numbering happens at insertion time.
pub struct DraftEntry {
    pub start_timecode: montage_models::Timecode,
    pub end_timecode: montage_models::Timecode,
    pub plan_type: String,
    pub description: String,
    pub dialogues: String,
}

/// Repository for montage entries (plans/shots) within a sheet.
#[derive(Clone)]
pub struct EntryRepository {
    client: DocumentStoreClient,
}

impl EntryRepository {
    pub fn new(client: DocumentStoreClient) -> Self {
        Self { client }
    }

    pub async fn list_for_sheet(&self, sheet_id: SheetId) -> PersistenceResult<Vec<MontageEntry>> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_documents(&entries_collection(sheet_id), Some(300), page_token.as_deref())
                .await?;
            for doc in page.documents.unwrap_or_default() {
                entries.push(document_to_entry(&doc, sheet_id)?);
            }
            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }
        entries.sort_by_key(|e| e.order_index);
        Ok(entries)
    }

    /// Insert `drafts` in order, computing `planNumber = orderIndex =
    /// lastPlanNumber + localIndex + 1`. A collision (two chunk completions
    /// racing on the same `lastPlanNumber`) is tolerated: that single draft
    /// is dropped and insertion proceeds with the rest (spec C10) — the
    /// finalizer's renumbering pass makes this loss harmless.
    pub async fn insert_entries(&self, sheet_id: SheetId, drafts: Vec<DraftEntry>) -> PersistenceResult<Vec<MontageEntry>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.list_for_sheet(sheet_id).await?;
        let last_plan_number = existing.iter().map(|e| e.plan_number).max().unwrap_or(0);

        let mut inserted = Vec::with_capacity(drafts.len());
        for (local_index, draft) in drafts.into_iter().enumerate() {
            let plan_number = last_plan_number + local_index as u32 + 1;
            let entry = MontageEntry {
                id: EntryId::new(),
                sheet_id,
                plan_number,
                order_index: plan_number,
                start_timecode: draft.start_timecode,
                end_timecode: draft.end_timecode,
                plan_type: draft.plan_type,
                description: draft.description,
                dialogues: draft.dialogues,
            };

            let fields = entry_to_fields(&entry);
            let doc_id = entry_doc_id(sheet_id, plan_number);
            match self.client.create_document(&entries_collection(sheet_id), &doc_id, fields).await {
                Ok(_) => inserted.push(entry),
                Err(PersistenceError::AlreadyExists(_)) => {
                    warn!(sheet_id = %sheet_id, plan_number, "entry insert collided on plan_number, dropping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(inserted)
    }

    /// Delete entries in batches of 100 (spec C12 step 2). `entries` must
    /// carry each row's still-current `plan_number`, since that's what its
    /// document ID is derived from.
    pub async fn delete_entries(&self, sheet_id: SheetId, entries: &[MontageEntry]) -> PersistenceResult<()> {
        for chunk in entries.chunks(DELETE_BATCH_SIZE) {
            let writes: Vec<Write> = chunk
                .iter()
                .map(|entry| Write {
                    update: None,
                    delete: Some(self.client.full_document_name(
                        &entries_collection(sheet_id),
                        &entry_doc_id(sheet_id, entry.plan_number),
                    )),
                    update_mask: None,
                    current_document: None,
                })
                .collect();
            self.client.batch_write(writes).await?.check_for_errors()?;
        }
        Ok(())
    }

    /// Renumber survivors to `planNumber = orderIndex = 1..N` contiguously
    /// (spec C12 step 3). `ordered` must already be in final order; the
    /// document itself keeps living at its original `(sheet_id, old
    /// plan_number)` key — only the field values change.
    pub async fn renumber(&self, sheet_id: SheetId, ordered: &[MontageEntry]) -> PersistenceResult<()> {
        for (chunk_idx, chunk) in ordered.chunks(DELETE_BATCH_SIZE).enumerate() {
            let base_index = chunk_idx * DELETE_BATCH_SIZE;
            let writes: Vec<Write> = chunk
                .iter()
                .enumerate()
                .map(|(offset, entry)| {
                    let new_number = (base_index + offset) as u32 + 1;
                    let mut fields = HashMap::new();
                    fields.insert("plan_number".to_string(), new_number.to_firestore_value());
                    fields.insert("order_index".to_string(), new_number.to_firestore_value());
                    Write {
                        update: Some(Document {
                            name: Some(self.client.full_document_name(
                                &entries_collection(sheet_id),
                                &entry_doc_id(sheet_id, entry.plan_number),
                            )),
                            fields: Some(fields),
                            create_time: None,
                            update_time: None,
                        }),
                        delete: None,
                        update_mask: Some(crate::types::DocumentMask {
                            field_paths: vec!["plan_number".to_string(), "order_index".to_string()],
                        }),
                        current_document: None,
                    }
                })
                .collect();
            self.client.batch_write(writes).await?.check_for_errors()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_status_round_trips_through_str() {
        for status in [
            VideoStatus::Uploaded,
            VideoStatus::Processing,
            VideoStatus::Completed,
            VideoStatus::Failed,
        ] {
            let s = video_status_to_str(status);
            assert_eq!(video_status_from_str(s), Some(status));
        }
    }

    #[test]
    fn entry_doc_id_is_derived_from_sheet_and_plan_number() {
        let sheet_id = SheetId::new();
        let doc_id = entry_doc_id(sheet_id, 3);
        assert_eq!(doc_id, format!("{}_{}", sheet_id.as_str(), 3));
    }

    #[test]
    fn lock_outcome_unwraps_either_variant_to_its_progress() {
        let sheet_id = SheetId::new();
        let progress = ProgressDocument::new(sheet_id, 24, vec![]);
        let initialized = LockOutcome::Initialized(progress.clone());
        let already = LockOutcome::AlreadyInitialized(progress.clone());
        assert_eq!(initialized.into_progress().sheet_id, progress.sheet_id);
        assert_eq!(already.into_progress().sheet_id, progress.sheet_id);
    }
}
