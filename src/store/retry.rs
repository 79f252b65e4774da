//! Bounded retry for persistence writes

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::EngineError;

/// How often and how patiently a write is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            attempts: config.write_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Single attempt, no waiting
    pub fn once() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Run an idempotent write until it succeeds or attempts run out.
///
/// Backoff grows linearly with the attempt number. The last error is
/// reported as `PersistenceWriteFailure`.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Write of {} succeeded on attempt {}", what, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt < attempts {
                    warn!("Write of {} failed (attempt {}/{}): {}, retrying", what, attempt, attempts, e);
                    tokio::time::sleep(policy.backoff * attempt).await;
                } else {
                    warn!("Write of {} failed after {} attempt(s): {}", what, attempts, e);
                }
                last_error = Some(e);
            }
        }
    }

    Err(EngineError::PersistenceWriteFailure {
        what: what.to_string(),
        attempts,
        message: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(quick(3), "tier", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                anyhow::bail!("database is locked");
            }
            Ok(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_with_persistence_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(quick(2), "score sample", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk full")
        })
        .await;

        match result {
            Err(EngineError::PersistenceWriteFailure { what, attempts, message }) => {
                assert_eq!(what, "score sample");
                assert_eq!(attempts, 2);
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
