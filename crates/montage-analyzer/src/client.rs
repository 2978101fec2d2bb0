//! HTTP client for the long-running prediction-style analyzer service (C6).

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::types::{CreatePredictionRequest, CreatePredictionResponse, GetPredictionResponse, PredictionStatus};

/// Creation attempts before giving up.
const MAX_CREATE_ATTEMPTS: u32 = 3;

/// Poll attempts before timing out (5 s apart, so 60 attempts ≈ 5 min).
const MAX_POLL_ATTEMPTS: u32 = 60;
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Failure codes the external analyzer documents as temporary.
const TEMPORARY_CODES: &[&str] = &["E6716", "E004"];

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ANALYZER_BASE_URL")
                .unwrap_or_else(|_| "https://api.analyzer.local".to_string()),
            model: std::env::var("ANALYZER_MODEL").unwrap_or_else(|_| "montage-sheet-v1".to_string()),
            request_timeout: Duration::from_secs(
                std::env::var("ANALYZER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
        }
    }
}

pub struct AnalyzerClient {
    http: Client,
    config: AnalyzerConfig,
}

impl AnalyzerClient {
    pub fn new(config: AnalyzerConfig) -> AnalyzerResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AnalyzerResult<Self> {
        Self::new(AnalyzerConfig::from_env())
    }

    /// Create a prediction for `video_url`/`prompt` authenticated with
    /// `api_token` (a handle acquired from the [`crate::pool::AnalyzerPool`]),
    /// retrying creation failures up to [`MAX_CREATE_ATTEMPTS`] times with
    /// linear backoff (2s, 4s, 6s).
    pub async fn create_prediction_with_retry(
        &self,
        api_token: &str,
        video_url: &str,
        prompt: &str,
    ) -> AnalyzerResult<String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.create_prediction(api_token, video_url, prompt).await {
                Ok(id) => return Ok(id),
                Err(e) if attempt >= MAX_CREATE_ATTEMPTS => return Err(e),
                Err(e) => {
                    let delay = Duration::from_secs(2 * attempt as u64);
                    warn!(attempt, error = %e, "prediction creation failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn create_prediction(&self, api_token: &str, video_url: &str, prompt: &str) -> AnalyzerResult<String> {
        let url = format!("{}/predictions", self.config.base_url);
        let body = CreatePredictionRequest {
            model: self.config.model.clone(),
            videos: vec![video_url.to_string()],
            prompt: prompt.to_string(),
        };

        debug!(%url, "creating analyzer prediction");
        let response = self.http.post(&url).bearer_auth(api_token).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::RequestFailed(format!("{status}: {text}")));
        }

        let created: CreatePredictionResponse = response.json().await?;
        Ok(created.id)
    }

    /// Poll the prediction at 5 s intervals for up to [`MAX_POLL_ATTEMPTS`].
    /// Any status other than `succeeded`/`failed`/`canceled` is "in progress".
    pub async fn poll_prediction(&self, api_token: &str, prediction_id: &str) -> AnalyzerResult<String> {
        for _ in 0..MAX_POLL_ATTEMPTS {
            let response = self.get_prediction(api_token, prediction_id).await?;
            match response.status {
                PredictionStatus::Succeeded => return Ok(response.output.unwrap_or_default()),
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    return Err(classify_prediction_failure(response.status, response.error));
                }
                PredictionStatus::Starting | PredictionStatus::Processing => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
        }
        Err(AnalyzerError::Timeout(MAX_POLL_ATTEMPTS as u64 * POLL_INTERVAL.as_secs()))
    }

    async fn get_prediction(&self, api_token: &str, prediction_id: &str) -> AnalyzerResult<GetPredictionResponse> {
        let url = format!("{}/predictions/{}", self.config.base_url, prediction_id);
        let response = self.http.get(&url).bearer_auth(api_token).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::RequestFailed(format!("{status}: {text}")));
        }

        Ok(response.json().await?)
    }
}

fn classify_prediction_failure(
    status: PredictionStatus,
    error: Option<crate::types::PredictionErrorBody>,
) -> AnalyzerError {
    let code = error.as_ref().and_then(|e| e.code.clone());
    let message = error.map(|e| e.message).unwrap_or_default();
    let temporary = is_temporary_failure(code.as_deref(), &message);
    AnalyzerError::PredictionFailed {
        status: format!("{status:?}").to_lowercase(),
        code,
        message,
        temporary,
    }
}

fn is_temporary_failure(code: Option<&str>, message: &str) -> bool {
    code.map(|c| TEMPORARY_CODES.contains(&c)).unwrap_or(false)
        || message.to_lowercase().contains("timeout")
}

/// Backoff for retrying a chunk whose analyzer call failed with a temporary
/// code: `min(attempt^2 * 5s, 90s)`.
pub fn quadratic_backoff(attempt: u32) -> Duration {
    let secs = (attempt.saturating_mul(attempt) as u64).saturating_mul(5).min(90);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporary_codes_are_recognized() {
        assert!(is_temporary_failure(Some("E6716"), ""));
        assert!(is_temporary_failure(Some("E004"), ""));
        assert!(is_temporary_failure(None, "request Timeout exceeded"));
        assert!(!is_temporary_failure(Some("E500"), "bad request"));
    }

    #[test]
    fn quadratic_backoff_caps_at_90_seconds() {
        assert_eq!(quadratic_backoff(1), Duration::from_secs(5));
        assert_eq!(quadratic_backoff(4), Duration::from_secs(80));
        assert_eq!(quadratic_backoff(10), Duration::from_secs(90));
    }
}
