//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::cache::{CachePurgeParams, purge_impl, stats_impl};
use crate::tools::game_batch::{GameBatchParams, batch_impl};
use crate::tools::game_details::{GameDetailsParams, details_impl};
use crate::tools::game_find::{GameFindParams, find_impl};
use crate::tools::game_search::{GameSearchParams, search_impl};

use meeple_client::CatalogClient;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for mcp-meeple.
#[derive(Clone)]
pub struct MeepleServer {
    client: CatalogClient,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl MeepleServer {
    /// Create a new server handler around a shared catalog client.
    pub fn new(client: CatalogClient) -> Self {
        Self { client, tool_router: Self::tool_router() }
    }

    /// Search the catalog by name.
    ///
    /// Results are ranked exact match first, then prefix, then substring, newest first within a tier.
    #[tool(
        description = "Search board games by name. Returns ranked matches with id, name, year and type. Results are cached for a few minutes."
    )]
    async fn game_search(&self, params: Parameters<GameSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.client, params.0).await
    }

    #[tool(description = "Get full details for one game by catalog id: players, playtime, ratings, designers, mechanics.")]
    async fn game_details(&self, params: Parameters<GameDetailsParams>) -> Result<CallToolResult, McpError> {
        details_impl(&self.client, params.0).await
    }

    /// Fetch several games at once, best effort.
    #[tool(description = "Get details for several games by id. Ids that cannot be fetched are skipped.")]
    async fn game_batch(&self, params: Parameters<GameBatchParams>) -> Result<CallToolResult, McpError> {
        batch_impl(&self.client, params.0).await
    }

    #[tool(description = "Resolve a game name to the single best match and return its full details.")]
    async fn game_find(&self, params: Parameters<GameFindParams>) -> Result<CallToolResult, McpError> {
        find_impl(&self.client, params.0).await
    }

    #[tool(description = "Show response cache counters and in-flight upstream requests.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.client).await
    }

    #[tool(description = "Purge cached responses by key prefix (search:, game:, games:), or all when no prefix is given.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.client, params.0).await
    }
}

impl ServerHandler for MeepleServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-meeple".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::client;

    #[test]
    fn test_router_lists_all_tools() {
        let (client, _) = client();
        let server = MeepleServer::new(client);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["cache_purge", "cache_stats", "game_batch", "game_details", "game_find", "game_search"]
        );
    }

    #[test]
    fn test_server_info() {
        let (client, _) = client();
        let info = MeepleServer::new(client).get_info();
        assert_eq!(info.server_info.name, "mcp-meeple");
        assert!(info.capabilities.tools.is_some());
    }
}
