//! Bounded exponential retry for transient agent failures

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Backoff before the second attempt
    pub base_backoff: Duration,
    /// Upper bound on any single backoff
    pub max_backoff: Duration,
    /// Multiplier applied per further attempt
    pub multiplier: f64,
    /// Add random jitter to delays. Off by default so backoff stays
    /// monotonically non-decreasing.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the base backoff
    #[must_use]
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Set the backoff cap
    #[must_use]
    pub fn with_max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    /// Set the per-attempt multiplier
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Backoff after the given failed attempt (1-based)
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let base =
            self.base_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped = base.min(self.max_backoff.as_millis() as f64) as u64;

        let total = if self.jitter {
            capped + pseudo_jitter(capped / 4)
        } else {
            capped
        };
        Duration::from_millis(total)
    }
}

/// Time-derived jitter, enough to de-synchronize retries without a rand dependency
fn pseudo_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % max
}

/// Failure after the retry budget is spent
#[derive(Debug)]
pub struct RetryError<E> {
    /// The last error observed
    pub last_error: E,
    /// Attempts made, including the first
    pub attempts: u32,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "operation failed after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// Run an async operation with bounded exponential backoff.
///
/// `is_retryable` gates which errors are worth another attempt; a
/// non-retryable error returns immediately with `attempts` set to however
/// many were actually made.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let max_attempts = config.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt < max_attempts && is_retryable(&e) {
                    let delay = config.backoff_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = ?e,
                        "operation failed, backing off before retry"
                    );
                    sleep(delay).await;
                } else {
                    debug!(attempt, error = ?e, "operation failed, giving up");
                    return Err(RetryError {
                        last_error: e,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    unreachable!("retry loop returns from the error branch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .with_base_backoff(Duration::from_millis(100))
            .with_max_backoff(Duration::from_millis(300))
            .with_multiplier(2.0);

        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        // 400ms uncapped, held at the 300ms cap.
        assert_eq!(config.backoff_for(3), Duration::from_millis(300));
        assert_eq!(config.backoff_for(4), Duration::from_millis(300));
    }

    #[test]
    fn test_backoff_monotonic_without_jitter() {
        let config = RetryConfig::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=8 {
            let delay = config.backoff_for(attempt);
            assert!(delay >= previous, "backoff shrank at attempt {attempt}");
            previous = delay;
        }
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_backoff(Duration::from_millis(1));

        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<u32, RetryError<&str>> = retry_with_backoff(
            &config,
            || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient")
                    } else {
                        Ok(7)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_backoff(Duration::from_millis(1));

        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<u32, RetryError<&str>> = retry_with_backoff(
            &config,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, &str>("still failing")
                }
            },
            |_| true,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let config = RetryConfig::new().with_max_attempts(5);

        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<u32, RetryError<&str>> = retry_with_backoff(
            &config,
            || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, &str>("deterministic")
                }
            },
            |_| false,
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
