//! Retry with exponential backoff.
//!
//! [`retry`] wraps one async operation. After a failure it asks a predicate
//! whether the error is worth another attempt and, if so, sleeps
//! `min(base_delay * 2^(attempt - 1), max_delay)` (plus optional jitter)
//! before trying again. When it gives up it returns [`RetryError`], which keeps
//! the last underlying error together with the number of attempts made.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use meeple_core::{AppConfig, cache};
use rand::Rng;

/// Upper bound of the random jitter, as a fraction of the computed delay.
const MAX_JITTER: f64 = 0.25;

/// Backoff settings for [`retry`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use meeple_client::RetryPolicy;
///
/// let policy = RetryPolicy::default()
///     .max_attempts(5)
///     .base_delay(Duration::from_millis(500))
///     .max_delay(Duration::from_secs(10))
///     .jitter(false);
///
/// assert_eq!(policy.delay_for(1), Duration::from_millis(500));
/// assert_eq!(policy.delay_for(3), Duration::from_secs(2));
/// assert_eq!(policy.delay_for(10), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Add up to 25% random extra delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(1), max_delay: Duration::from_secs(30), jitter: true }
    }
}

impl From<&AppConfig> for RetryPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry_max_attempts,
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Backoff after the given failed attempt (1-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    fn sleep_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if self.jitter && !delay.is_zero() {
            delay + delay.mul_f64(rand::rng().random_range(0.0..=MAX_JITTER))
        } else {
            delay
        }
    }
}

/// The operation failed and will not be retried.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed after {attempts} attempt(s): {source}")]
pub struct RetryError<E> {
    /// Attempts made, the failing one included.
    pub attempts: u32,
    /// Error from the last attempt.
    #[source]
    pub source: E,
}

/// Run `operation` until it succeeds, `should_retry` declines, or attempts run out.
///
/// `operation` receives the 1-based attempt number. `should_retry` receives the
/// error and the attempt that produced it. Each retry is logged at `warn`.
///
/// # Errors
///
/// Returns [`RetryError`] with the last error and the number of attempts.
pub async fn retry<T, E, F, Fut, P>(policy: &RetryPolicy, mut should_retry: P, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&E, u32) -> bool,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= max_attempts || !should_retry(&error, attempt) {
                    return Err(RetryError { attempts: attempt, source: error });
                }

                let delay = policy.sleep_for(attempt);
                tracing::warn!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, error = %error, "retrying after failure");
                cache::queued(tokio::time::sleep(delay)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::default()
            .max_attempts(max_attempts)
            .base_delay(Duration::from_millis(100))
            .jitter(false)
    }

    fn is_transient(err: &TestError, _attempt: u32) -> bool {
        *err == TestError::Transient
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert!(policy.jitter);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default().jitter(false);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.sleep_for(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let result: Result<(), _> = retry(&fast_policy(3), is_transient, |_| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Transient)
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.source, TestError::Transient);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry(&fast_policy(5), is_transient, |_| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Permanent)
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let result = retry(&fast_policy(4), is_transient, |attempt| async move {
            if attempt < 3 { Err(TestError::Transient) } else { Ok(attempt) }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_success_returns_immediately() {
        let start = std::time::Instant::now();
        let result: Result<&str, RetryError<TestError>> =
            retry(&RetryPolicy::default(), is_transient, |_| async { Ok("done") }).await;
        assert_eq!(result.unwrap(), "done");
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_sees_attempt_number() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let _ = retry(
            &fast_policy(3),
            move |_: &TestError, attempt| {
                recorder.lock().push(attempt);
                true
            },
            |_| async { Err::<(), _>(TestError::Transient) },
        )
        .await;

        assert_eq!(*seen.lock(), vec![1, 2]);
    }
}
