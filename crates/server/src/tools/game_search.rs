//! game_search tool implementation.
//!
//! Searches the catalog by name, ranked by relevance, with caching.

use meeple_client::{CatalogClient, GameType, RateLimitScope, RequestOptions};
use meeple_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::envelope_result;

/// Input parameters for game_search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GameSearchParams {
    /// Game name or part of it (required, max 200 chars).
    pub query: String,

    /// Item type: boardgame (default), expansion, accessory.
    #[serde(default)]
    pub game_type: Option<String>,

    /// Only return items whose name matches exactly.
    #[serde(default)]
    pub exact: bool,

    /// Caller id the request is charged to; anonymous when omitted.
    #[serde(default)]
    pub caller: Option<String>,

    /// Force a refresh, bypassing the cache.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Implementation of the game_search tool.
pub async fn search_impl(client: &CatalogClient, params: GameSearchParams) -> Result<CallToolResult, McpError> {
    let game_type = match params.game_type.as_deref() {
        Some(raw) => raw.parse::<GameType>().map_err(Error::from)?,
        None => GameType::BoardGame,
    };

    let options = RequestOptions::for_scope(RateLimitScope::from_caller(params.caller.as_deref()))
        .force_refresh(params.force_refresh);
    let response = client.search_games_with(&params.query, game_type, params.exact, options).await;

    envelope_result(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{client, result_json};

    #[tokio::test]
    async fn test_search_returns_ranked_envelope() {
        let (client, _) = client();
        let params = GameSearchParams { query: "catan".into(), ..Default::default() };

        let result = search_impl(&client, params).await.unwrap();
        assert_ne!(result.is_error, Some(true));
        let json = result_json(&result);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"][0]["name"], "Catan");
        assert_eq!(json["data"][0]["type"], "boardgame");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_unknown_game_type_is_invalid_params() {
        let (client, transport) = client();
        let params = GameSearchParams { query: "catan".into(), game_type: Some("rpg".into()), ..Default::default() };

        let err = search_impl(&client, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
        assert_eq!(transport.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_query_is_failed_envelope() {
        let (client, _) = client();
        let result = search_impl(&client, GameSearchParams::default()).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        let json = result_json(&result);
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("query cannot be empty"));
    }
}
