//! Catalog client error types.

use std::sync::Arc;

use meeple_core::{CacheError, Error};

use crate::retry::RetryError;
use crate::throttle::ThrottleError;

/// Errors from the catalog client.
///
/// Cloneable so one failure can be handed to every caller waiting on the same
/// in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    /// Request rejected before reaching upstream.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Upstream has no such game.
    #[error("not found: {0}")]
    NotFound(String),

    /// Local per-caller quota exhausted.
    #[error(transparent)]
    QuotaExceeded(#[from] ThrottleError),

    /// Upstream answered 429 or reported a rate limit in the body.
    #[error("upstream rate limited")]
    UpstreamRateLimited,

    /// Non-success HTTP status.
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    /// Upstream returned an error document or a "try again later" notice.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Retries exhausted; `source` is the last failure.
    #[error("gave up after {attempts} attempts: {source}")]
    Retry {
        attempts: u32,
        #[source]
        source: Box<CatalogError>,
    },

    /// Cache coordination failed independently of the fetch.
    #[error("cache error: {0}")]
    Cache(String),
}

impl CatalogError {
    /// Whether another attempt at the same request may succeed.
    ///
    /// Timeouts, network failures, 5xx, 429 and upstream error notices are
    /// transient. Invalid input, missing games, parse failures, other 4xx and
    /// local quota rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Timeout
            | CatalogError::Network(_)
            | CatalogError::UpstreamRateLimited
            | CatalogError::Upstream(_) => true,
            CatalogError::Http { status } => *status == 429 || *status >= 500,
            CatalogError::InvalidInput(_)
            | CatalogError::NotFound(_)
            | CatalogError::QuotaExceeded(_)
            | CatalogError::Parse(_)
            | CatalogError::Retry { .. }
            | CatalogError::Cache(_) => false,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { CatalogError::Timeout } else { CatalogError::Network(Arc::new(err)) }
    }
}

impl From<RetryError<CatalogError>> for CatalogError {
    /// A single attempt keeps the original error; exhausted retries are wrapped.
    fn from(err: RetryError<CatalogError>) -> Self {
        if err.attempts <= 1 {
            err.source
        } else {
            CatalogError::Retry { attempts: err.attempts, source: Box::new(err.source) }
        }
    }
}

impl From<CacheError<CatalogError>> for CatalogError {
    fn from(err: CacheError<CatalogError>) -> Self {
        match err {
            CacheError::Producer { source, .. } => source,
            other => CatalogError::Cache(other.to_string()),
        }
    }
}

impl From<CatalogError> for Error {
    fn from(err: CatalogError) -> Self {
        let message = err.to_string();
        match err {
            CatalogError::InvalidInput(msg) => Error::InvalidInput(msg),
            CatalogError::NotFound(msg) => Error::NotFound(msg),
            CatalogError::QuotaExceeded(ThrottleError::QuotaExceeded { retry_after, .. }) => {
                Error::RateLimited { message, retry_after: Some(retry_after) }
            }
            CatalogError::UpstreamRateLimited => Error::RateLimited { message, retry_after: None },
            CatalogError::Http { status: 404 } => Error::NotFound(message),
            CatalogError::Http { status: 429 } => Error::RateLimited { message, retry_after: None },
            CatalogError::Http { status: 400..=499 } => Error::InvalidInput(message),
            CatalogError::Http { .. } | CatalogError::Upstream(_) => Error::ServerError(message),
            CatalogError::Timeout => Error::Timeout(message),
            CatalogError::Network(_) => Error::NetworkError(message),
            CatalogError::Parse(_) => Error::ParseError(message),
            CatalogError::Retry { source, .. } => match Error::from(*source) {
                Error::RateLimited { retry_after, .. } => Error::RateLimited { message, retry_after },
                Error::Timeout(_) => Error::Timeout(message),
                Error::NetworkError(_) => Error::NetworkError(message),
                Error::ServerError(_) => Error::ServerError(message),
                other => other,
            },
            CatalogError::Cache(msg) => Error::CacheError(msg),
        }
    }
}
