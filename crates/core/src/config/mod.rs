//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MEEPLE_*)
//! 2. TOML config file (if MEEPLE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MEEPLE_*)
/// 2. TOML config file (if MEEPLE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the catalog XML API.
    ///
    /// Set via MEEPLE_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent string sent with every upstream request.
    ///
    /// Set via MEEPLE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via MEEPLE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Minimum spacing between two upstream calls in milliseconds.
    ///
    /// Set via MEEPLE_MIN_REQUEST_INTERVAL_MS environment variable.
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Upstream calls allowed per caller within one quota window.
    ///
    /// Set via MEEPLE_QUOTA_PER_WINDOW environment variable.
    #[serde(default = "default_quota_per_window")]
    pub quota_per_window: u32,

    /// Length of the per-caller quota window in seconds.
    ///
    /// Set via MEEPLE_QUOTA_WINDOW_SECS environment variable.
    #[serde(default = "default_quota_window_secs")]
    pub quota_window_secs: u64,

    /// Maximum attempts per upstream call, the first one included.
    ///
    /// Set via MEEPLE_RETRY_MAX_ATTEMPTS environment variable.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Delay before the first retry in milliseconds (doubles each attempt).
    ///
    /// Set via MEEPLE_RETRY_BASE_DELAY_MS environment variable.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    ///
    /// Set via MEEPLE_RETRY_MAX_DELAY_MS environment variable.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// TTL for search results in seconds.
    ///
    /// Set via MEEPLE_SEARCH_TTL_SECS environment variable.
    #[serde(default = "default_search_ttl_secs")]
    pub search_ttl_secs: u64,

    /// TTL for game details in seconds.
    ///
    /// Set via MEEPLE_DETAIL_TTL_SECS environment variable.
    #[serde(default = "default_detail_ttl_secs")]
    pub detail_ttl_secs: u64,

    /// TTL for keys outside the search and detail categories, in seconds.
    ///
    /// Set via MEEPLE_DEFAULT_TTL_SECS environment variable.
    #[serde(default = "default_default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Age in seconds after which an unsettled in-flight request is purged.
    ///
    /// Set via MEEPLE_PENDING_STALE_SECS environment variable.
    #[serde(default = "default_pending_stale_secs")]
    pub pending_stale_secs: u64,

    /// Upper bound on cached entries; least recently read entries are evicted first.
    ///
    /// Set via MEEPLE_MAX_CACHE_ENTRIES environment variable.
    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,
}

fn default_base_url() -> String {
    "https://boardgamegeek.com/xmlapi2".into()
}

fn default_user_agent() -> String {
    "meeple-gateway/0.1 (+https://github.com/meeple-market/meeple)".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_min_request_interval_ms() -> u64 {
    1_000
}

fn default_quota_per_window() -> u32 {
    60
}

fn default_quota_window_secs() -> u64 {
    60
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1_000
}

fn default_retry_max_delay_ms() -> u64 {
    30_000
}

fn default_search_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_detail_ttl_secs() -> u64 {
    3_600 // 1 hour
}

fn default_default_ttl_secs() -> u64 {
    900 // 15 minutes
}

fn default_pending_stale_secs() -> u64 {
    120
}

fn default_max_cache_entries() -> usize {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            min_request_interval_ms: default_min_request_interval_ms(),
            quota_per_window: default_quota_per_window(),
            quota_window_secs: default_quota_window_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            search_ttl_secs: default_search_ttl_secs(),
            detail_ttl_secs: default_detail_ttl_secs(),
            default_ttl_secs: default_default_ttl_secs(),
            pending_stale_secs: default_pending_stale_secs(),
            max_cache_entries: default_max_cache_entries(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Minimum spacing between upstream calls.
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// Length of the per-caller quota window.
    pub fn quota_window(&self) -> Duration {
        Duration::from_secs(self.quota_window_secs)
    }

    /// Delay before the first retry.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Upper bound for a single backoff delay.
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    /// Cache settings derived from this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            search_ttl: Duration::from_secs(self.search_ttl_secs),
            detail_ttl: Duration::from_secs(self.detail_ttl_secs),
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            pending_stale_after: Duration::from_secs(self.pending_stale_secs),
            max_entries: self.max_cache_entries,
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MEEPLE_`
    /// 2. TOML file from `MEEPLE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MEEPLE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MEEPLE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
