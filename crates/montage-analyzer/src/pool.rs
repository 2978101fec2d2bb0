//! Analyzer-client pool (C6): a process-wide, constructor-injected set of
//! API-key handles with least-loaded, error-cooldown-aware selection.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AnalyzerError, AnalyzerResult};

/// Errors within this window are treated as "recent" and deprioritize a
/// handle even once it's otherwise free.
const ERROR_COOLDOWN: Duration = Duration::from_secs(30);

/// How often `acquire()` re-checks for a free handle while waiting.
const ACQUIRE_TICK: Duration = Duration::from_secs(1);

/// Ceiling on how long `acquire()` will wait before giving up.
const ACQUIRE_CEILING: Duration = Duration::from_secs(5 * 60);

/// One API-key handle. Per-key concurrency is fixed at 1, a deliberately
/// conservative choice against provider-side per-key rate limits.
#[derive(Debug, Clone)]
struct ClientHandle {
    key: String,
    active_requests: u32,
    consecutive_errors: u32,
    last_error_time: Option<Instant>,
}

impl ClientHandle {
    fn new(key: String) -> Self {
        Self {
            key,
            active_requests: 0,
            consecutive_errors: 0,
            last_error_time: None,
        }
    }

    fn is_free(&self) -> bool {
        self.active_requests == 0
    }

    fn has_recent_error(&self) -> bool {
        self.last_error_time
            .map(|t| t.elapsed() < ERROR_COOLDOWN)
            .unwrap_or(false)
    }

    /// Sort key: recent-error flag first, then consecutive errors, then
    /// active requests — the handle with the smallest tuple wins.
    fn priority(&self) -> (bool, u32, u32) {
        (self.has_recent_error(), self.consecutive_errors, self.active_requests)
    }
}

/// Holds no per-video state; clients are pure API-credential handles shared
/// across every video's orchestrator task.
pub struct AnalyzerPool {
    handles: Mutex<Vec<ClientHandle>>,
}

impl AnalyzerPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            handles: Mutex::new(keys.into_iter().map(ClientHandle::new).collect()),
        }
    }

    /// Build the pool from `ANALYZER_API_TOKEN_1..N`, falling back to a
    /// single unnumbered `ANALYZER_API_TOKEN` variable.
    pub fn from_env() -> AnalyzerResult<Self> {
        let mut keys = Vec::new();
        let mut n = 1;
        loop {
            match std::env::var(format!("ANALYZER_API_TOKEN_{n}")) {
                Ok(key) => {
                    keys.push(key);
                    n += 1;
                }
                Err(_) => break,
            }
        }
        if keys.is_empty() {
            if let Ok(key) = std::env::var("ANALYZER_API_TOKEN") {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Err(AnalyzerError::InvalidResponse(
                "no ANALYZER_API_TOKEN_* or ANALYZER_API_TOKEN configured".to_string(),
            ));
        }
        Ok(Self::new(keys))
    }

    /// Returns the healthy handle with the smallest
    /// `(recentErrorFlag, consecutiveErrors, activeRequests)` key. Waits in
    /// 1-second ticks up to a 5-minute ceiling if none are free.
    pub async fn acquire(&self) -> AnalyzerResult<String> {
        let deadline = Instant::now() + ACQUIRE_CEILING;
        loop {
            {
                let mut handles = self.handles.lock().await;
                let best = handles
                    .iter_mut()
                    .filter(|h| h.is_free())
                    .min_by_key(|h| h.priority());
                if let Some(handle) = best {
                    handle.active_requests += 1;
                    debug!(key = %handle.key, "acquired analyzer client");
                    return Ok(handle.key.clone());
                }
            }
            if Instant::now() >= deadline {
                return Err(AnalyzerError::NoClientAvailable);
            }
            tokio::time::sleep(ACQUIRE_TICK).await;
        }
    }

    /// Decrement the in-flight counter for `key`.
    pub async fn release(&self, key: &str) {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.iter_mut().find(|h| h.key == key) {
            handle.active_requests = handle.active_requests.saturating_sub(1);
        }
    }

    /// Zero the error counters for `key`.
    pub async fn mark_success(&self, key: &str) {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.iter_mut().find(|h| h.key == key) {
            handle.consecutive_errors = 0;
            handle.last_error_time = None;
        }
    }

    /// Increment the error counters for `key` and timestamp the event.
    pub async fn mark_error(&self, key: &str, reason: &str) {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.iter_mut().find(|h| h.key == key) {
            handle.consecutive_errors += 1;
            handle.last_error_time = Some(Instant::now());
            warn!(key = %handle.key, reason, consecutive_errors = handle.consecutive_errors, "analyzer client marked error");
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_prefers_least_loaded_key() {
        let pool = AnalyzerPool::new(vec!["a".to_string(), "b".to_string()]);
        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert_ne!(first, second);
        pool.release(&first).await;
        let third = pool.acquire().await.unwrap();
        assert_eq!(third, first);
    }

    #[tokio::test]
    async fn mark_error_deprioritizes_handle() {
        let pool = AnalyzerPool::new(vec!["a".to_string(), "b".to_string()]);
        pool.mark_error("a", "boom").await;
        let acquired = pool.acquire().await.unwrap();
        assert_eq!(acquired, "b");
    }

    #[tokio::test]
    async fn pool_from_explicit_keys_has_expected_len() {
        let pool = AnalyzerPool::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(pool.len().await, 3);
    }
}
