//! mcp-meeple server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use meeple_client::CatalogClient;
use meeple_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        base_url = %config.base_url,
        quota_per_window = config.quota_per_window,
        min_request_interval_ms = config.min_request_interval_ms,
        "Starting mcp-meeple server on stdio transport"
    );

    let client = CatalogClient::new(&config)?;
    let handler = handler::MeepleServer::new(client);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
