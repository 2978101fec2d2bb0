//! Worker error types.

use montage_models::{Classifiable, ErrorKind};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("too many chunk retries: {0}")]
    TooManyRetries(String),

    #[error("storage error: {0}")]
    Storage(#[from] montage_storage::StorageError),

    #[error("persistence error: {0}")]
    Persistence(#[from] montage_persistence::PersistenceError),

    #[error("media error: {0}")]
    Media(#[from] montage_planner::MediaError),

    #[error("analyzer error: {0}")]
    Analyzer(#[from] montage_analyzer::AnalyzerError),

    #[error("queue error: {0}")]
    Queue(#[from] montage_queue::QueueError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::JobFailed(_) | WorkerError::TooManyRetries(_) => ErrorKind::PerVideoTerminal,
            WorkerError::Config(_) => ErrorKind::Validation,
            WorkerError::Storage(e) => e.kind(),
            WorkerError::Persistence(e) => e.kind(),
            WorkerError::Media(e) => e.kind(),
            WorkerError::Analyzer(e) => e.kind(),
            WorkerError::Queue(e) => e.kind(),
            WorkerError::Io(_) => ErrorKind::Transient,
        }
    }
}

impl Classifiable for WorkerError {
    fn kind(&self) -> ErrorKind {
        WorkerError::kind(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_failed_is_per_video_terminal() {
        assert_eq!(WorkerError::job_failed("boom").kind(), ErrorKind::PerVideoTerminal);
    }

    #[test]
    fn config_error_is_validation() {
        assert_eq!(WorkerError::config("bad").kind(), ErrorKind::Validation);
    }
}
