//! Application state.

use std::sync::Arc;

use montage_persistence::repos::{EntryRepository, SheetRepository, VideoRepository};
use montage_persistence::DocumentStoreClient;
use montage_queue::JobQueue;
use montage_storage::ObjectStoreClient;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<ObjectStoreClient>,
    pub video_repo: VideoRepository,
    pub sheet_repo: SheetRepository,
    pub entry_repo: EntryRepository,
    pub queue: Arc<JobQueue>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let docstore = DocumentStoreClient::from_env().await?;
        let video_repo = VideoRepository::new(docstore.clone());
        let sheet_repo = SheetRepository::new(docstore.clone());
        let entry_repo = EntryRepository::new(docstore);

        let storage = ObjectStoreClient::from_env().await?;
        let queue = JobQueue::from_env()?;

        Ok(Self {
            config,
            storage: Arc::new(storage),
            video_repo,
            sheet_repo,
            entry_repo,
            queue: Arc::new(queue),
        })
    }
}
