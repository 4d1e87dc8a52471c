//! In-memory response cache with per-key request coalescing.
//!
//! This module provides the cache that sits in front of every upstream call:
//!
//! - Deterministic keys built from the operation and its normalized input
//! - Per-category TTLs (search, detail, other)
//! - Singleflight: concurrent misses for one key share a single fetch
//! - A capacity bound with least-recently-read eviction

mod key;
mod store;

use std::time::Duration;

pub use key::{CacheKey, GAME_PREFIX, GAMES_PREFIX, KeyCategory, SEARCH_PREFIX, category_of, normalize_query};
pub use store::{CacheStats, ResponseCache, queued};

/// Cache tuning, usually derived from [`AppConfig::cache_config`](crate::config::AppConfig::cache_config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub search_ttl: Duration,
    pub detail_ttl: Duration,
    pub default_ttl: Duration,
    /// In-flight fetches older than this are forgotten so later callers start fresh.
    pub pending_stale_after: Duration,
    pub max_entries: usize,
}

impl CacheConfig {
    /// TTL applied to entries of the given category.
    pub fn ttl_for(&self, category: KeyCategory) -> Duration {
        match category {
            KeyCategory::Search => self.search_ttl,
            KeyCategory::Detail => self.detail_ttl,
            KeyCategory::Other => self.default_ttl,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl: Duration::from_secs(300),
            detail_ttl: Duration::from_secs(3_600),
            default_ttl: Duration::from_secs(900),
            pending_stale_after: Duration::from_secs(120),
            max_entries: 10_000,
        }
    }
}

/// Failure of [`ResponseCache::get_or_fetch`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError<E> {
    /// The producer failed; every caller attached to the fetch sees the same error.
    #[error("fetch for {key} failed: {source}")]
    Producer { key: String, source: E },

    /// The key holds a value or error of a different type than requested.
    #[error("cached value for {key} has an unexpected type")]
    TypeMismatch { key: String },

    /// The fetch task panicked or was cancelled before settling.
    #[error("fetch for {key} was abandoned")]
    Abandoned { key: String },
}
