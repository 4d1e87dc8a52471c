//! Unified error types for meeple.
//!
//! Every failure that crosses the public boundary is reduced to one of these
//! variants. The `Display` form starts with the stable error code.

use std::time::Duration;

use rmcp::model::{ErrorCode, ErrorData as McpError};
use serde_json::json;

/// Unified error types for the meeple gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The catalog has no matching game.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),

    /// Local quota or upstream rate limit reached.
    #[error("RATE_LIMITED: {message}")]
    RateLimited { message: String, retry_after: Option<Duration> },

    /// Upstream did not answer in time.
    #[error("TIMEOUT: {0}")]
    Timeout(String),

    /// Upstream answered with a server error or an embedded error document.
    #[error("SERVER_ERROR: {0}")]
    ServerError(String),

    /// Connection-level failure.
    #[error("NETWORK_ERROR: {0}")]
    NetworkError(String),

    /// Upstream payload could not be parsed.
    #[error("PARSE_ERROR: {0}")]
    ParseError(String),

    /// The cache coordinator failed independently of the fetch.
    #[error("CACHE_ERROR: {0}")]
    CacheError(String),
}

impl Error {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::RateLimited { .. } => "RATE_LIMITED",
            Error::Timeout(_) => "TIMEOUT",
            Error::ServerError(_) => "SERVER_ERROR",
            Error::NetworkError(_) => "NETWORK_ERROR",
            Error::ParseError(_) => "PARSE_ERROR",
            Error::CacheError(_) => "CACHE_ERROR",
        }
    }

    /// Whether the same request may succeed later without changes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. } | Error::Timeout(_) | Error::ServerError(_) | Error::NetworkError(_)
        )
    }

    /// Actionable text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput(msg) => format!("Invalid request: {msg}"),
            Error::NotFound(_) => "No matching game was found in the catalog.".to_string(),
            Error::RateLimited { retry_after: Some(after), .. } => {
                let secs = after.as_secs() + u64::from(after.subsec_nanos() > 0);
                format!("Too many requests. Please try again in {} seconds.", secs.max(1))
            }
            Error::RateLimited { retry_after: None, .. } => "Too many requests. Please try again shortly.".to_string(),
            Error::Timeout(_) => "The catalog service timed out. Please retry.".to_string(),
            Error::ServerError(_) => "The catalog service is having trouble. Please try again later.".to_string(),
            Error::NetworkError(_) => "Could not reach the catalog service. Check your connection and retry.".to_string(),
            Error::ParseError(_) => "The catalog service returned an unexpected response.".to_string(),
            Error::CacheError(_) => "An internal error occurred. Please retry.".to_string(),
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::NotFound(_) => -32001,
            Error::RateLimited { .. } => -32002,
            Error::Timeout(_) => -32003,
            Error::ServerError(_) => -32004,
            Error::NetworkError(_) => -32005,
            Error::ParseError(_) => -32006,
            Error::CacheError(_) => -32007,
        };

        let mut data = json!({ "code": err.code(), "user_message": err.user_message() });
        if let Error::RateLimited { retry_after: Some(after), .. } = &err {
            data["retry_after_secs"] = json!(after.as_secs_f64());
        }

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: Some(data) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("no game with id 42".to_string());
        assert!(err.to_string().starts_with("NOT_FOUND"));
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_rate_limited_user_message() {
        let err = Error::RateLimited { message: "quota".into(), retry_after: Some(Duration::from_millis(29_100)) };
        assert_eq!(err.user_message(), "Too many requests. Please try again in 30 seconds.");

        let err = Error::RateLimited { message: "upstream".into(), retry_after: None };
        assert_eq!(err.user_message(), "Too many requests. Please try again shortly.");
    }

    #[test]
    fn test_timeout_user_message() {
        assert_eq!(Error::Timeout("10s".into()).user_message(), "The catalog service timed out. Please retry.");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout(String::new()).is_transient());
        assert!(Error::NetworkError(String::new()).is_transient());
        assert!(!Error::InvalidInput(String::new()).is_transient());
        assert!(!Error::ParseError(String::new()).is_transient());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let mcp_err: McpError = Error::InvalidInput("empty query".to_string()).into();
        assert_eq!(mcp_err.code.0, -32602);

        let err = Error::RateLimited { message: "quota".into(), retry_after: Some(Duration::from_secs(5)) };
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32002);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["code"], "RATE_LIMITED");
        assert_eq!(data["retry_after_secs"], 5.0);
    }
}
