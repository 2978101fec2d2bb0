//! Document-store error types.

use montage_models::{Classifiable, ErrorKind};
use thiserror::Error;

/// Result type for document-store operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors that can occur during document-store operations.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error(transparent)]
    ConcurrentTransition(#[from] montage_models::ConcurrentTransition),
}

impl PersistenceError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PersistenceError::Network(_) | PersistenceError::RateLimited(_)
        )
    }

    /// True if the error was caused by a failed precondition (e.g., updateTime mismatch).
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, PersistenceError::PreconditionFailed(_))
            || matches!(
                self,
                PersistenceError::RequestFailed(msg)
                if msg.contains("FAILED_PRECONDITION") || msg.contains("Precondition")
            )
    }

    /// Suggested delay before retrying, if the error carries one.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            PersistenceError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistenceError::AuthError(_)
            | PersistenceError::PermissionDenied(_)
            | PersistenceError::SerializationError(_) => ErrorKind::PerVideoTerminal,
            PersistenceError::NotFound(_) => ErrorKind::PerChunkTerminal,
            PersistenceError::AlreadyExists(_) => ErrorKind::PerChunkTerminal,
            PersistenceError::ConcurrentTransition(_) => ErrorKind::PerChunkTerminal,
            PersistenceError::InvalidResponse(_) | PersistenceError::Json(_) => {
                ErrorKind::PerChunkTerminal
            }
            PersistenceError::RequestFailed(_)
            | PersistenceError::RateLimited(_)
            | PersistenceError::Network(_)
            | PersistenceError::PreconditionFailed(_) => ErrorKind::Transient,
        }
    }
}

impl Classifiable for PersistenceError {
    fn kind(&self) -> ErrorKind {
        PersistenceError::kind(self)
    }
}
