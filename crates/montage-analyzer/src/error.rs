//! Analyzer client/pool error types.

use thiserror::Error;

use montage_models::{Classifiable, ErrorKind};

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("no analyzer client available after waiting")]
    NoClientAvailable,

    #[error("analyzer request failed: {0}")]
    RequestFailed(String),

    #[error("invalid analyzer response: {0}")]
    InvalidResponse(String),

    #[error("analyzer poll timed out after {0} seconds")]
    Timeout(u64),

    #[error("prediction {status}: {message}")]
    PredictionFailed {
        status: String,
        code: Option<String>,
        message: String,
        /// Whether the failure code is one of the external interface's
        /// documented temporary codes (`E6716`, `E004`, explicit timeout).
        temporary: bool,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AnalyzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzerError::NoClientAvailable
            | AnalyzerError::RequestFailed(_)
            | AnalyzerError::Network(_)
            | AnalyzerError::Timeout(_) => ErrorKind::Transient,
            AnalyzerError::PredictionFailed { temporary, .. } => {
                if *temporary {
                    ErrorKind::Transient
                } else {
                    ErrorKind::PerChunkTerminal
                }
            }
            AnalyzerError::InvalidResponse(_) | AnalyzerError::Json(_) => ErrorKind::PerChunkTerminal,
        }
    }
}

impl Classifiable for AnalyzerError {
    fn kind(&self) -> ErrorKind {
        AnalyzerError::kind(self)
    }
}
