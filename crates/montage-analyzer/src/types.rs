//! Wire types for the analyzer's prediction API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreatePredictionRequest {
    pub model: String,
    pub videos: Vec<String>,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePredictionResponse {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    /// Any status other than `succeeded`/`failed`/`canceled` is "in progress".
    pub fn is_in_progress(self) -> bool {
        matches!(self, PredictionStatus::Starting | PredictionStatus::Processing)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionErrorBody {
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetPredictionResponse {
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<PredictionErrorBody>,
}
