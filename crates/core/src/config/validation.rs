//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `base_url` is not an http(s) URL
    /// - `user_agent` is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `quota_per_window` or `quota_window_secs` is 0
    /// - `retry_max_attempts` is outside 1..=10
    /// - `retry_base_delay_ms` exceeds `retry_max_delay_ms`
    /// - any TTL, the stale threshold or `max_cache_entries` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(invalid("base_url", "must start with http:// or https://"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.quota_per_window == 0 {
            return Err(invalid("quota_per_window", "must be greater than 0"));
        }
        if self.quota_window_secs == 0 {
            return Err(invalid("quota_window_secs", "must be greater than 0"));
        }

        if !(1..=10).contains(&self.retry_max_attempts) {
            return Err(invalid("retry_max_attempts", "must be between 1 and 10"));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(invalid("retry_base_delay_ms", "must not exceed retry_max_delay_ms"));
        }

        for (field, value) in [
            ("search_ttl_secs", self.search_ttl_secs),
            ("detail_ttl_secs", self.detail_ttl_secs),
            ("default_ttl_secs", self.default_ttl_secs),
            ("pending_stale_secs", self.pending_stale_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        if self.max_cache_entries == 0 {
            return Err(invalid("max_cache_entries", "must be greater than 0"));
        }

        if self.search_ttl_secs > self.detail_ttl_secs {
            tracing::warn!(
                search_ttl_secs = self.search_ttl_secs,
                detail_ttl_secs = self.detail_ttl_secs,
                "search results outlive game details; search TTL is usually the shorter one"
            );
        }

        Ok(())
    }
}
