//! Retry logic with linear backoff
//!
//! Only transient failures are retried. A quota error ends the loop at
//! once so the caller can switch the provider off for the rest of the run.

use crate::error::{Result, StockError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Backoff before attempt `n + 1` is `step * n`
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self::new(3, Duration::from_millis(5))
    }

    /// Backoff after the given failed attempt (1-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.step * attempt
    }

    /// Execute an async operation with retry logic
    ///
    /// Returns the first success, the first non-transient error, or the last
    /// error once all attempts are used.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error: Option<StockError> = None;

        for attempt in 1..=self.max_attempts {
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt, self.max_attempts, operation_name
            );

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => {
                    debug!("Operation '{}' failed with non-retryable error: {}", operation_name, e);
                    return Err(e);
                }
                Err(e) => {
                    if attempt < self.max_attempts {
                        let backoff = self.backoff_duration(attempt);
                        warn!(
                            "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                            operation_name, attempt, self.max_attempts, e, backoff
                        );
                        sleep(backoff).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            StockError::ApiError(format!("{operation_name}: retry failed with no error"))
        });
        warn!(
            "Operation '{}' failed after {} attempts: {}",
            operation_name, self.max_attempts, error
        );
        Err(error)
    }
}
