//! In-memory TTL cache with singleflight request coalescing.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::key::{CacheKey, category_of};
use super::{CacheConfig, CacheError};

/// Minimum spacing between two full expiry sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

type AnyValue = Arc<dyn Any + Send + Sync>;

/// Outcome of an in-flight fetch as seen by every caller attached to it.
#[derive(Clone)]
enum FlightError {
    Producer(AnyValue),
    Abandoned,
}

type FlightOutcome = Result<AnyValue, FlightError>;
type Flight = Shared<BoxFuture<'static, FlightOutcome>>;

struct CacheEntry {
    data: AnyValue,
    created_at: Instant,
    expires_at: Instant,
    last_read: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

tokio::task_local! {
    static FLIGHT_CLOCK: Arc<FlightClock>;
}

/// Liveness of one in-flight fetch, shared between its record and its task.
struct FlightClock {
    last_active: Mutex<Instant>,
    queued: AtomicUsize,
}

impl FlightClock {
    fn new(now: Instant) -> Self {
        Self { last_active: Mutex::new(now), queued: AtomicUsize::new(0) }
    }

    /// Idle time counted towards staleness; zero while the fetch is queued.
    fn idle_for(&self, now: Instant) -> Duration {
        if self.queued.load(Ordering::SeqCst) > 0 {
            return Duration::ZERO;
        }
        now.saturating_duration_since(*self.last_active.lock())
    }
}

struct QueueGuard(Arc<FlightClock>);

impl Drop for QueueGuard {
    fn drop(&mut self) {
        *self.0.last_active.lock() = Instant::now();
        self.0.queued.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Awaits `fut` as time spent waiting for a turn rather than working.
///
/// Inside a producer started by [`ResponseCache::get_or_fetch`], the in-flight
/// record does not age while `fut` runs and its age restarts once `fut`
/// completes, so a fetch parked behind rate limiting or backoff is never
/// purged as stale. Elsewhere this is a plain await.
pub async fn queued<F: Future>(fut: F) -> F::Output {
    let Ok(clock) = FLIGHT_CLOCK.try_with(Arc::clone) else {
        return fut.await;
    };
    clock.queued.fetch_add(1, Ordering::SeqCst);
    let _guard = QueueGuard(clock);
    fut.await
}

struct PendingRequest {
    id: u64,
    future: Flight,
    clock: Arc<FlightClock>,
    task: AbortHandle,
}

impl PendingRequest {
    /// A record is stale once its task died without settling it, or once it
    /// sat idle (not queued) for `stale_after`.
    fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        self.task.is_finished() || self.clock.idle_for(now) >= stale_after
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    pending: HashMap<String, PendingRequest>,
    next_flight: u64,
    last_sweep: Option<Instant>,
    hits: u64,
    misses: u64,
    joins: u64,
    evictions: u64,
}

impl CacheState {
    /// Drops expired entries and abandoned in-flight records.
    ///
    /// Runs at most once per [`SWEEP_INTERVAL`] unless `force` is set.
    fn sweep(&mut self, now: Instant, stale_after: Duration, force: bool) -> usize {
        if !force
            && let Some(last) = self.last_sweep
            && now.saturating_duration_since(last) < SWEEP_INTERVAL
        {
            return 0;
        }
        self.last_sweep = Some(now);

        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let expired = before - self.entries.len();

        self.pending.retain(|key, pending| {
            let stale = pending.is_stale(now, stale_after);
            if stale {
                tracing::warn!(key = %key, idle = ?pending.clock.idle_for(now), "purging stale in-flight request");
            }
            !stale
        });

        expired
    }

    /// Evicts the least recently read entry while at capacity.
    fn make_room(&mut self, key: &str, max_entries: usize, now: Instant, stale_after: Duration) {
        if self.entries.contains_key(key) || self.entries.len() < max_entries {
            return;
        }
        self.sweep(now, stale_after, true);
        while self.entries.len() >= max_entries {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_read)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
            self.evictions += 1;
            tracing::debug!(key = %oldest, "evicted least recently read cache entry");
        }
    }

    fn store(&mut self, key: String, data: AnyValue, config: &CacheConfig, now: Instant) {
        self.make_room(&key, config.max_entries, now, config.pending_stale_after);
        let ttl = config.ttl_for(category_of(&key));
        self.entries.insert(key, CacheEntry { data, created_at: now, expires_at: now + ttl, last_read: now });
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently held, expired ones not yet swept included.
    pub entries: usize,
    /// Fetches currently in flight.
    pub pending: usize,
    /// Reads answered from a live entry.
    pub hits: u64,
    /// Reads that started a new fetch.
    pub misses: u64,
    /// Reads that attached to a fetch already in flight.
    pub joins: u64,
    /// Entries dropped to stay under the capacity bound.
    pub evictions: u64,
}

/// Process-local response cache with request coalescing.
///
/// Values of any `Send + Sync + 'static` type can be stored; each key is
/// expected to always carry the same type. The first caller that misses a key
/// becomes the leader and runs the producer on a detached task, so the fetch
/// completes and populates the cache even if that caller goes away. Every
/// concurrent caller for the same key awaits the leader's outcome instead of
/// running its own producer.
///
/// The handle is cheap to clone; clones share state.
///
/// # Example
///
/// ```
/// use meeple_core::cache::{CacheConfig, CacheKey, ResponseCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = ResponseCache::new(CacheConfig::default());
/// let key = CacheKey::game(13);
///
/// let value = cache
///     .get_or_fetch(&key, false, || async { Ok::<_, String>("Catan".to_string()) })
///     .await
///     .unwrap();
/// assert_eq!(value.as_str(), "Catan");
/// # }
/// ```
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { inner: Arc::new(CacheInner { state: Mutex::new(CacheState::default()), config }) }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the cached value for `key`, or fetches it with `producer`.
    ///
    /// - Without `force_refresh`, a live entry is returned with no I/O.
    /// - A fetch already in flight for `key` is joined; `producer` is not run.
    /// - Otherwise `producer` runs once; a success is cached with the key's
    ///   category TTL, a failure is returned to every attached caller and
    ///   nothing is cached.
    ///
    /// A forced refresh that finds a fetch in flight joins it: that fetch
    /// settles after the caller's request was issued.
    ///
    /// An in-flight fetch is abandoned as stale only after `pending_stale_after`
    /// without activity; waits wrapped in [`queued`] do not count.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self, key: &CacheKey, force_refresh: bool, producer: F,
    ) -> Result<Arc<T>, CacheError<E>>
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();
            state.sweep(now, self.inner.config.pending_stale_after, false);

            if let Some(entry) = state.entries.get(key.as_str())
                && entry.is_expired(now)
            {
                state.entries.remove(key.as_str());
            }

            if !force_refresh && let Some(entry) = state.entries.get_mut(key.as_str()) {
                entry.last_read = now;
                let data = entry.data.clone();
                let age = now.saturating_duration_since(entry.created_at);
                state.hits += 1;
                tracing::debug!(key = %key, ?age, "cache hit");
                return downcast_value(key, data);
            }

            if let Some(pending) = state.pending.get(key.as_str()) {
                let flight = pending.future.clone();
                state.joins += 1;
                tracing::debug!(key = %key, "joining in-flight request");
                flight
            } else {
                state.misses += 1;
                let id = state.next_flight;
                state.next_flight += 1;
                let clock = Arc::new(FlightClock::new(now));
                let (flight, task) = self.launch(key, id, Arc::clone(&clock), producer);
                state
                    .pending
                    .insert(key.as_str().to_owned(), PendingRequest { id, future: flight.clone(), clock, task });
                tracing::debug!(key = %key, force_refresh, "cache miss, fetching");
                flight
            }
        };

        match flight.await {
            Ok(data) => downcast_value(key, data),
            Err(FlightError::Producer(err)) => match err.downcast_ref::<E>() {
                Some(source) => Err(CacheError::Producer { key: key.to_string(), source: source.clone() }),
                None => Err(CacheError::TypeMismatch { key: key.to_string() }),
            },
            Err(FlightError::Abandoned) => Err(CacheError::Abandoned { key: key.to_string() }),
        }
    }

    /// Spawns the producer and returns a shareable handle to its outcome.
    ///
    /// The spawned task settles the pending record itself so the cache is
    /// updated whether or not anyone is still awaiting the handle.
    fn launch<T, E, F, Fut>(
        &self, key: &CacheKey, id: u64, clock: Arc<FlightClock>, producer: F,
    ) -> (Flight, AbortHandle)
    where
        T: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task_key = key.as_str().to_owned();
        let task = tokio::spawn(async move {
            let outcome = FLIGHT_CLOCK.scope(clock, producer()).await;

            let mut state = inner.state.lock();
            let owns_slot = state.pending.get(&task_key).is_some_and(|pending| pending.id == id);
            if owns_slot {
                state.pending.remove(&task_key);
            }

            match outcome {
                Ok(value) => {
                    let data: AnyValue = Arc::new(value);
                    if owns_slot {
                        state.store(task_key, data.clone(), &inner.config, Instant::now());
                    } else {
                        tracing::debug!(key = %task_key, "fetch settled after its slot was purged, not caching");
                    }
                    Ok(data)
                }
                Err(err) => Err(FlightError::Producer(Arc::new(err))),
            }
        });
        let abort = task.abort_handle();

        let inner = Arc::clone(&self.inner);
        let join_key = key.as_str().to_owned();
        let flight = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(key = %join_key, error = %err, "fetch task did not complete");
                    let mut state = inner.state.lock();
                    if state.pending.get(&join_key).is_some_and(|pending| pending.id == id) {
                        state.pending.remove(&join_key);
                    }
                    Err(FlightError::Abandoned)
                }
            }
        }
        .boxed()
        .shared();

        (flight, abort)
    }

    /// Returns a live cached value without fetching.
    pub fn get<T: Send + Sync + 'static>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let entry = state.entries.get_mut(key.as_str())?;
        if entry.is_expired(now) {
            state.entries.remove(key.as_str());
            return None;
        }
        entry.last_read = now;
        entry.data.clone().downcast::<T>().ok()
    }

    /// Stores `value` under `key` as if it had just been fetched.
    pub fn insert<T: Send + Sync + 'static>(&self, key: &CacheKey, value: T) {
        let mut state = self.inner.state.lock();
        state.store(key.as_str().to_owned(), Arc::new(value), &self.inner.config, Instant::now());
    }

    /// Removes the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.inner.state.lock().entries.remove(key.as_str()).is_some()
    }

    /// Removes every entry whose key starts with `prefix`. Returns the count.
    pub fn purge_prefix(&self, prefix: &str) -> usize {
        let mut state = self.inner.state.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        before - state.entries.len()
    }

    /// Removes expired entries and stale in-flight records now.
    ///
    /// Returns the number of expired entries removed.
    pub fn sweep(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.sweep(Instant::now(), self.inner.config.pending_stale_after, true)
    }

    /// Drops all entries, in-flight records and counters.
    ///
    /// Fetches already running still settle, but their results are not cached.
    /// Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.state.lock();
        let dropped = state.entries.len();
        let next_flight = state.next_flight;
        *state = CacheState { next_flight, ..Default::default() };
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        CacheStats {
            entries: state.entries.len(),
            pending: state.pending.len(),
            hits: state.hits,
            misses: state.misses,
            joins: state.joins,
            evictions: state.evictions,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

fn downcast_value<T, E>(key: &CacheKey, data: AnyValue) -> Result<Arc<T>, CacheError<E>>
where
    T: Send + Sync + 'static,
{
    data.downcast::<T>().map_err(|_| CacheError::TypeMismatch { key: key.to_string() })
}
