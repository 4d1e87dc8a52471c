//! cache_purge tool implementation.
//!
//! Purges cache entries by key prefix, or everything when no prefix is given.

use meeple_client::CatalogClient;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge only keys starting with this prefix, e.g. `search:` or `game:13`.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: usize,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(client: &CatalogClient, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let deleted = match params.prefix.as_deref().map(str::trim) {
        Some(prefix) if !prefix.is_empty() => client.cache().purge_prefix(prefix),
        _ => client.clear_cache(),
    };
    tracing::info!(prefix = ?params.prefix, deleted, "cache purged");

    json_result(&CachePurgeOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::game_details::{GameDetailsParams, details_impl};
    use crate::tools::game_search::{GameSearchParams, search_impl};
    use crate::tools::test_support::{client, result_json};

    async fn warm(client: &CatalogClient) {
        search_impl(client, GameSearchParams { query: "catan".into(), ..Default::default() }).await.unwrap();
        details_impl(client, GameDetailsParams { id: 13, ..Default::default() }).await.unwrap();
    }

    fn deleted(result: &CallToolResult) -> usize {
        let output: CachePurgeOutput = serde_json::from_value(result_json(result)).unwrap();
        output.deleted
    }

    #[tokio::test]
    async fn test_purge_by_prefix() {
        let (client, _) = client();
        warm(&client).await;

        let params = CachePurgeParams { prefix: Some("search:".into()) };
        assert_eq!(deleted(&purge_impl(&client, params).await.unwrap()), 1);
        assert_eq!(client.cache().stats().entries, 1);
    }

    #[tokio::test]
    async fn test_purge_everything() {
        let (client, _) = client();
        warm(&client).await;

        assert_eq!(deleted(&purge_impl(&client, CachePurgeParams::default()).await.unwrap()), 2);
        assert_eq!(client.cache().stats().entries, 0);
    }
}
