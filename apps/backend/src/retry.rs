//! Bounded retry with exponential backoff.
//!
//! Wraps database calls: transient failures are retried up to a fixed
//! attempt count with doubling delays; the overall duration and final
//! outcome land in the metrics registry under the operation name.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::metrics::{MetricsRegistry, Outcome};

/// Retry parameters for one class of operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        (self.base_delay * factor).min(self.max_delay)
    }
}

/// Run `op`, retrying transient errors per `policy`, and record the
/// sample to `metrics` under `name`.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    metrics: &MetricsRegistry,
    name: &str,
    is_transient: fn(&E) -> bool,
    op: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                metrics.record(name, start.elapsed(), Outcome::Ok);
                return Ok(value);
            }
            Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                tracing::debug!(operation = name, attempt, "transient failure, retrying");
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(err) => {
                metrics.record(name, start.elapsed(), Outcome::Error);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
    }

    fn transient(err: &TestError) -> bool {
        matches!(err, TestError::Transient)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let metrics = MetricsRegistry::default();
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), &metrics, "op", transient, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TestError::Transient)
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.summary("op").unwrap().errors, 0);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let metrics = MetricsRegistry::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), &metrics, "op", transient, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Transient)
        })
        .await;
        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.summary("op").unwrap().errors, 1);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let metrics = MetricsRegistry::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), &metrics, "op", transient, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal)
        })
        .await;
        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }
}
