//! Retry with exponential backoff for transient provider failures.

use crate::config::HARD_ATTEMPT_CEILING;
use crate::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Retry classification predicate. Defaults to [`Error::is_retryable`].
pub type ClassifyFn = fn(&Error) -> bool;

fn default_classify(err: &Error) -> bool {
    err.is_retryable()
}

/// Immutable retry configuration, read-only at call time.
///
/// `max_attempts` counts total attempts (first call included) and is capped
/// by [`HARD_ATTEMPT_CEILING`] in the constructor so a misconfigured caller
/// cannot cause a retry storm.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    classify: ClassifyFn,
}

impl RetryPolicy {
    pub fn new(requested_attempts: u32) -> Self {
        Self {
            max_attempts: requested_attempts.clamp(1, HARD_ATTEMPT_CEILING),
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            classify: default_classify,
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_classifier(mut self, classify: ClassifyFn) -> Self {
        self.classify = classify;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff to sleep after failed attempt `attempt` (1-based):
    /// `base * multiplier^(attempt-1)`, clamped to `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let ms = (self.base_delay.as_millis() as f64 * exp).round();
        let ms = if ms.is_finite() { ms.max(0.0) as u64 } else { u64::MAX };
        Duration::from_millis(ms).min(self.max_delay)
    }
}

/// Executes an async operation under a [`RetryPolicy`].
///
/// Performs no caching or rate limiting itself; the gateway composes those
/// around it.
pub struct RetryExecutor;

impl RetryExecutor {
    /// Runs `op`, retrying failures the policy classifies as transient.
    ///
    /// Permanent failures surface unchanged after a single attempt. When a
    /// transient failure exhausts the budget, the last error is wrapped as
    /// [`Error::RetriesExhausted`] with the attempt count and elapsed time.
    /// An upstream `retry-after` hint takes precedence over the computed
    /// backoff.
    pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if (policy.classify)(&err) => {
                    if attempt >= policy.max_attempts {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            elapsed: started.elapsed(),
                            source: Box::new(err),
                        });
                    }
                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| policy.backoff_delay(attempt))
                        .min(policy.max_delay);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts).with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn attempts_are_capped_by_the_hard_ceiling() {
        assert_eq!(RetryPolicy::new(100).max_attempts(), HARD_ATTEMPT_CEILING);
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(3).max_attempts(), 3);
    }

    #[test]
    fn backoff_grows_exponentially_and_clamps() {
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn success_on_first_attempt_calls_once() {
        let calls = AtomicU32::new(0);
        let result = RetryExecutor::run(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Error>(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn always_transient_exhausts_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryExecutor::run(&fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transient("upstream 503", Some(503))) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(Error::RetriesExhausted { attempts, source, .. }) => {
                assert_eq!(attempts, 3);
                assert!(source.is_retryable());
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn permanent_errors_are_attempted_exactly_once() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryExecutor::run(&fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::permanent("bad request", Some(400))) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(Error::Provider { .. })));
    }

    #[tokio::test]
    async fn recovery_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = RetryExecutor::run(&fast_policy(4), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::transient("flaky", Some(500)))
                } else {
                    Ok("recovered")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn custom_classifier_overrides_default() {
        // Treat everything as permanent: a transient error is not retried.
        let policy = fast_policy(5).with_classifier(|_| false);
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryExecutor::run(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::transient("once", None)) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }
}
