//! HTTP transport for the catalog XML API.
//!
//! ### Behaviour
//! - Fixed User-Agent, `Accept: application/xml`
//! - Per-request timeout (default 10s), reported as `CatalogError::Timeout`
//! - `429` maps to `CatalogError::UpstreamRateLimited`, other non-2xx to
//!   `CatalogError::Http`
//! - `202 Accepted` means upstream queued the request; reported as a
//!   retryable `CatalogError::Upstream`
//! - Successful bodies are scanned for embedded error markers, since upstream
//!   sometimes reports failures with a 200 status

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use url::Url;

use meeple_core::AppConfig;

use crate::catalog::CatalogError;

/// Source of raw XML documents. Implemented over HTTP by [`HttpTransport`];
/// tests substitute scripted fakes.
#[async_trait]
pub trait XmlTransport: Send + Sync {
    /// Fetch `url` and return the body as text.
    async fn get(&self, url: &Url) -> Result<String, CatalogError>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// User agent string.
    pub user_agent: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { user_agent: AppConfig::default().user_agent, timeout: Duration::from_secs(10) }
    }
}

impl From<&AppConfig> for TransportConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout() }
    }
}

/// reqwest-backed [`XmlTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, CatalogError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(CatalogError::from)?;

        Ok(Self { http })
    }
}

#[async_trait]
impl XmlTransport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<String, CatalogError> {
        let start = Instant::now();

        let response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, "application/xml")
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("catalog response status {} for {}", status, url);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::UpstreamRateLimited);
        }
        if status == StatusCode::ACCEPTED {
            return Err(CatalogError::Upstream("request queued upstream, please try again later".to_string()));
        }
        if !status.is_success() {
            return Err(CatalogError::Http { status: status.as_u16() });
        }

        let bytes: Bytes = response.bytes().await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        if let Some(err) = detect_error_marker(&body) {
            tracing::debug!("catalog body for {} carries an error marker: {}", url, err);
            return Err(err);
        }

        tracing::debug!("fetched {} in {}ms ({} bytes)", url, start.elapsed().as_millis(), bytes.len());

        Ok(body)
    }
}

/// Inspect a successful body for upstream error notices.
///
/// Matching is by case-insensitive substring: `<error` and `<errors>` element
/// markers, and the phrases `rate limit exceeded` and `please try again later`.
pub fn detect_error_marker(body: &str) -> Option<CatalogError> {
    let lowered = body.to_lowercase();

    if lowered.contains("rate limit exceeded") {
        return Some(CatalogError::UpstreamRateLimited);
    }
    if lowered.contains("<error") || lowered.contains("<errors>") {
        let message = extract_message(body).unwrap_or_else(|| "upstream returned an error document".to_string());
        return Some(CatalogError::Upstream(message));
    }
    if lowered.contains("please try again later") {
        return Some(CatalogError::Upstream("upstream asked to try again later".to_string()));
    }

    None
}

fn extract_message(body: &str) -> Option<String> {
    let start = body.find("<message>")? + "<message>".len();
    let end = body[start..].find("</message>")? + start;
    let message = body[start..end].trim();
    (!message.is_empty()).then(|| message.to_string())
}
