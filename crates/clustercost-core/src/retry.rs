//! Retry with exponential backoff
//!
//! Upstream price-history and inventory APIs throttle aggressively. A
//! [`RetryPolicy`] re-runs an async operation while its error is judged
//! transient by the policy's predicate, sleeping between attempts.

use crate::error::{CostError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether an error is worth another attempt
pub type RetryPredicate = fn(&CostError) -> bool;

/// Exponential backoff retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor applied per attempt
    pub multiplier: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub predicate: RetryPredicate,
}

impl Default for RetryPolicy {
    /// 1s, doubling, capped at 10s, 5 attempts, retrying transient upstream errors
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            max_attempts: 5,
            predicate: CostError::is_transient,
        }
    }
}

impl RetryPolicy {
    /// Default policy with a different attempt budget
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Policy that runs the operation exactly once
    pub fn none() -> Self {
        Self::with_max_attempts(1)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let delay = self.base_delay.as_secs_f64() * factor;
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Run `f` until it succeeds, fails permanently, or the budget runs out.
    ///
    /// Non-retryable errors are returned unchanged. When every attempt fails
    /// with a retryable error, the last one is wrapped in
    /// [`CostError::RetriesExhausted`].
    pub async fn run<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        let mut last_delay = Duration::ZERO;

        loop {
            let error = match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !(self.predicate)(&e) => return Err(e),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= max_attempts {
                warn!("{} failed after {} attempts: {}", operation, max_attempts, error);
                return Err(CostError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: max_attempts,
                    last_delay,
                    source: Box::new(error),
                });
            }

            last_delay = self.backoff(attempt - 1);
            warn!(
                "{} failed (attempt {}/{}), retrying in {:?}: {}",
                operation, attempt, max_attempts, last_delay, error
            );
            tokio::time::sleep(last_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_attempts,
            ..RetryPolicy::default()
        }
    }

    fn throttled() -> CostError {
        CostError::Upstream {
            code: "RequestLimitExceeded".to_string(),
            message: "rate exceeded".to_string(),
        }
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(30), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast_policy(5)
            .run("fetch", move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(throttled())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = fast_policy(5)
            .run("fetch", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CostError::Config("bad".to_string()))
            })
            .await;

        assert!(matches!(result, Err(CostError::Config(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = fast_policy(3)
            .run("fetch", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(throttled())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(CostError::RetriesExhausted {
                attempts, source, ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(source.is_transient());
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_none_policy_runs_once() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> =
            tokio_test::block_on(RetryPolicy::none().run("fetch", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(throttled())
            }));
        assert!(matches!(result, Err(CostError::RetriesExhausted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
