//! Error types for chunk planning, shot detection and the video splitter.

use std::path::PathBuf;
use thiserror::Error;

use montage_models::{ErrorKind, TimecodeError};

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("shot detector tool not found in PATH")]
    DetectorUnavailable,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed { message: String, stderr: Option<String> },

    #[error("download failed: {message}")]
    DownloadFailed { message: String },

    #[error("unsupported video duration: {0}")]
    UnsupportedDuration(f64),

    #[error("invalid timecode: {0}")]
    InvalidTimecode(#[from] TimecodeError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid video file: {0}")]
    InvalidVideo(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] montage_storage::StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::UnsupportedDuration(_) | MediaError::InvalidTimecode(_) => {
                ErrorKind::Validation
            }
            MediaError::DetectorUnavailable => ErrorKind::PerVideoTerminal,
            MediaError::DownloadFailed { .. }
            | MediaError::FfmpegFailed { .. }
            | MediaError::FfprobeFailed { .. }
            | MediaError::Storage(_)
            | MediaError::Io(_)
            | MediaError::Timeout(_) => ErrorKind::Transient,
            _ => ErrorKind::PerVideoTerminal,
        }
    }
}

impl montage_models::Classifiable for MediaError {
    fn kind(&self) -> ErrorKind {
        MediaError::kind(self)
    }
}
