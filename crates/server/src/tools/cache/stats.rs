//! cache_stats tool implementation.

use meeple_client::CatalogClient;
use meeple_core::CacheStats;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatsOutput {
    pub entries: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    pub joins: u64,
    pub evictions: u64,
    /// Upstream calls currently holding a throttle permit.
    pub upstream_in_flight: usize,
}

impl CacheStatsOutput {
    fn new(stats: CacheStats, upstream_in_flight: usize) -> Self {
        Self {
            entries: stats.entries,
            pending: stats.pending,
            hits: stats.hits,
            misses: stats.misses,
            joins: stats.joins,
            evictions: stats.evictions,
            upstream_in_flight,
        }
    }
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(client: &CatalogClient) -> Result<CallToolResult, McpError> {
    let output = CacheStatsOutput::new(client.cache().stats(), client.throttle().in_flight());
    json_result(&output)
}
