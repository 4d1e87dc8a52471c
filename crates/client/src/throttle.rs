//! Outbound throttle for upstream calls.
//!
//! Two independent limits apply before any request leaves the process:
//!
//! - **Spacing**: consecutive upstream calls start at least `min_interval`
//!   apart. Callers inside the floor are delayed, never rejected.
//! - **Quota**: each [`RateLimitScope`] may start at most `quota` calls per
//!   sliding `window`. Over quota fails fast with
//!   [`ThrottleError::QuotaExceeded`].
//!
//! The throttle never retries; that is the retry controller's job. Spacing
//! waits run under [`meeple_core::cache::queued`], so a cached fetch that is
//! waiting its turn is not purged as stale.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use meeple_core::{AppConfig, cache};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

/// Scope windows left untouched are pruned once the map grows past this.
const PRUNE_THRESHOLD: usize = 1024;

/// Whose quota a call is charged to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    User(String),
    #[default]
    Anonymous,
}

impl RateLimitScope {
    /// Scope for an optional caller id; blank ids are anonymous.
    pub fn from_caller(caller: Option<&str>) -> Self {
        match caller.map(str::trim) {
            Some(id) if !id.is_empty() => RateLimitScope::User(id.to_string()),
            _ => RateLimitScope::Anonymous,
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitScope::User(id) => write!(f, "user:{id}"),
            RateLimitScope::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Errors from the throttle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThrottleError {
    /// The scope used up its quota for the current window.
    #[error("rate limit exceeded for {scope}, retry in {retry_after:?}")]
    QuotaExceeded { scope: RateLimitScope, retry_after: Duration },
}

/// Throttle limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub min_interval: Duration,
    pub quota: u32,
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { min_interval: Duration::from_secs(1), quota: 60, window: Duration::from_secs(60) }
    }
}

impl From<&AppConfig> for ThrottleConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_interval: config.min_request_interval(),
            quota: config.quota_per_window,
            window: config.quota_window(),
        }
    }
}

#[derive(Default)]
struct ThrottleState {
    /// Earliest instant the next call may start.
    next_slot: Option<Instant>,
    /// Call instants per scope inside the current window, oldest first.
    windows: HashMap<RateLimitScope, VecDeque<Instant>>,
    in_flight: usize,
}

impl ThrottleState {
    fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = calls.front() {
            if now.saturating_duration_since(oldest) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

struct ThrottleInner {
    config: ThrottleConfig,
    state: Mutex<ThrottleState>,
}

/// Shared outbound throttle. Cheap to clone; clones share limits.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use meeple_client::throttle::{RateLimitScope, Throttle, ThrottleConfig, ThrottleError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let throttle = Throttle::new(ThrottleConfig { min_interval: Duration::ZERO, quota: 1, window: Duration::from_secs(60) });
/// let scope = RateLimitScope::User("alice".into());
///
/// let first: Result<u32, ThrottleError> = throttle.execute(&scope, || async { Ok(1) }).await;
/// assert!(first.is_ok());
///
/// let second: Result<u32, ThrottleError> = throttle.execute(&scope, || async { Ok(2) }).await;
/// assert!(matches!(second, Err(ThrottleError::QuotaExceeded { .. })));
/// # }
/// ```
#[derive(Clone)]
pub struct Throttle {
    inner: Arc<ThrottleInner>,
}

/// Proof that a call passed the throttle. Counts as in flight until dropped
/// or handed back with [`Throttle::release`].
#[must_use = "the call counts as in flight until the permit is released"]
pub struct ThrottlePermit {
    inner: Arc<ThrottleInner>,
}

impl Drop for ThrottlePermit {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { inner: Arc::new(ThrottleInner { config, state: Mutex::new(ThrottleState::default()) }) }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.inner.config
    }

    /// Charge one call to `scope`, or fail if its window is full.
    ///
    /// # Errors
    ///
    /// Returns `ThrottleError::QuotaExceeded` with the time until the oldest
    /// call in the window expires.
    pub fn check_quota(&self, scope: &RateLimitScope) -> Result<(), ThrottleError> {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock();
        let now = Instant::now();

        if state.windows.len() > PRUNE_THRESHOLD {
            state.windows.retain(|_, calls| {
                Self::prune_window(calls, now, config.window);
                !calls.is_empty()
            });
        }

        let calls = state.windows.entry(scope.clone()).or_default();
        Self::prune_window(calls, now, config.window);

        if calls.len() >= config.quota as usize {
            let retry_after = calls
                .front()
                .map(|oldest| config.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(config.window);
            tracing::debug!(scope = %scope, ?retry_after, "quota exhausted");
            return Err(ThrottleError::QuotaExceeded { scope: scope.clone(), retry_after });
        }

        calls.push_back(now);
        Ok(())
    }

    fn prune_window(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        ThrottleState::prune(calls, now, window);
    }

    /// Wait for this caller's turn under the global spacing floor.
    ///
    /// The slot is reserved under the lock and slept outside it, so
    /// concurrent callers start in the order they arrived.
    pub async fn pace(&self) {
        let wait = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            let slot = state.next_slot.map_or(now, |next| next.max(now));
            state.next_slot = Some(slot + self.inner.config.min_interval);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "spacing upstream call");
            cache::queued(tokio::time::sleep(wait)).await;
        }
    }

    /// Charge the quota, wait for spacing, and mark a call in flight.
    ///
    /// # Errors
    ///
    /// Returns `ThrottleError::QuotaExceeded` without waiting if the scope is over quota.
    pub async fn acquire(&self, scope: &RateLimitScope) -> Result<ThrottlePermit, ThrottleError> {
        self.check_quota(scope)?;
        self.pace().await;
        self.inner.state.lock().in_flight += 1;
        Ok(ThrottlePermit { inner: Arc::clone(&self.inner) })
    }

    /// Hand a permit back once its call finished.
    pub fn release(&self, permit: ThrottlePermit) {
        drop(permit);
    }

    /// Run `operation` once it passes the throttle.
    ///
    /// # Errors
    ///
    /// Over-quota calls fail with `E::from(ThrottleError)` and `operation` is
    /// never started; otherwise the operation's own result is returned.
    pub async fn execute<T, E, F, Fut>(&self, scope: &RateLimitScope, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ThrottleError>,
    {
        let permit = self.acquire(scope).await?;
        let result = operation().await;
        self.release(permit);
        result
    }

    /// Calls `scope` may still start in the current window.
    pub fn available(&self, scope: &RateLimitScope) -> u32 {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let used = match state.windows.get_mut(scope) {
            Some(calls) => {
                Self::prune_window(calls, now, self.inner.config.window);
                calls.len()
            }
            None => 0,
        };
        self.inner.config.quota.saturating_sub(u32::try_from(used).unwrap_or(u32::MAX))
    }

    /// Calls currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Forget all quota windows and spacing state. In-flight permits stay counted.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.next_slot = None;
        state.windows.clear();
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn config(min_interval_ms: u64, quota: u32, window_secs: u64) -> ThrottleConfig {
        ThrottleConfig {
            min_interval: Duration::from_millis(min_interval_ms),
            quota,
            window: Duration::from_secs(window_secs),
        }
    }

    fn alice() -> RateLimitScope {
        RateLimitScope::User("alice".into())
    }

    #[test]
    fn test_scope_from_caller() {
        assert_eq!(RateLimitScope::from_caller(Some("bob")), RateLimitScope::User("bob".into()));
        assert_eq!(RateLimitScope::from_caller(Some("  ")), RateLimitScope::Anonymous);
        assert_eq!(RateLimitScope::from_caller(None), RateLimitScope::Anonymous);
        assert_eq!(RateLimitScope::User("bob".into()).to_string(), "user:bob");
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_fails_fast_without_running_operation() {
        let throttle = Throttle::new(config(0, 2, 60));
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let _: Result<(), ThrottleError> = throttle
                .execute(&alice(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let err = throttle.check_quota(&alice()).unwrap_err();
        assert!(matches!(err, ThrottleError::QuotaExceeded { retry_after, .. } if retry_after == Duration::from_secs(60)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_is_per_scope_and_window_slides() {
        let throttle = Throttle::new(config(0, 1, 10));
        throttle.check_quota(&alice()).unwrap();
        assert!(throttle.check_quota(&alice()).is_err());
        throttle.check_quota(&RateLimitScope::Anonymous).unwrap();
        assert_eq!(throttle.available(&alice()), 0);

        tokio::time::advance(Duration::from_secs(4)).await;
        let err = throttle.check_quota(&alice()).unwrap_err();
        assert!(matches!(err, ThrottleError::QuotaExceeded { retry_after, .. } if retry_after == Duration::from_secs(6)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(throttle.available(&alice()), 1);
        throttle.check_quota(&alice()).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_delays_without_rejecting() {
        let throttle = Throttle::new(config(1_000, 100, 60));
        let start = Instant::now();

        for _ in 0..3 {
            let result: Result<(), ThrottleError> = throttle.execute(&alice(), || async { Ok(()) }).await;
            assert!(result.is_ok());
        }

        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_queue_in_order() {
        let throttle = Throttle::new(config(500, 100, 60));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move {
                    throttle.pace().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();
        assert_eq!(
            elapsed,
            vec![Duration::ZERO, Duration::from_millis(500), Duration::from_millis(1_000), Duration::from_millis(1_500)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_not_applied_after_idle_gap() {
        let throttle = Throttle::new(config(1_000, 100, 60));
        throttle.pace().await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let before = Instant::now();
        throttle.pace().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_in_flight_tracking() {
        let throttle = Throttle::new(config(0, 10, 60));
        let permit = throttle.acquire(&alice()).await.unwrap();
        assert_eq!(throttle.in_flight(), 1);

        let second = throttle.acquire(&alice()).await.unwrap();
        assert_eq!(throttle.in_flight(), 2);
        throttle.release(permit);
        assert_eq!(throttle.in_flight(), 1);
        drop(second);
        assert_eq!(throttle.in_flight(), 0);
        assert_eq!(throttle.available(&alice()), 8);
    }

    #[tokio::test]
    async fn test_reset_clears_windows() {
        let throttle = Throttle::new(config(0, 1, 60));
        throttle.check_quota(&alice()).unwrap();
        throttle.reset();
        assert!(throttle.check_quota(&alice()).is_ok());
    }
}
