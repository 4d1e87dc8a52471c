//! game_details tool implementation.

use meeple_client::{CatalogClient, RateLimitScope, RequestOptions};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::envelope_result;

/// Input parameters for game_details tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GameDetailsParams {
    /// Catalog id of the game.
    pub id: u32,

    /// Caller id the request is charged to; anonymous when omitted.
    #[serde(default)]
    pub caller: Option<String>,

    /// Force a refresh, bypassing the cache.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Implementation of the game_details tool.
pub async fn details_impl(client: &CatalogClient, params: GameDetailsParams) -> Result<CallToolResult, McpError> {
    let options = RequestOptions::for_scope(RateLimitScope::from_caller(params.caller.as_deref()))
        .force_refresh(params.force_refresh);
    envelope_result(&client.get_game_details_with(params.id, options).await)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::tools::test_support::{client, result_json};

    #[tokio::test]
    async fn test_details_cached_between_calls() {
        let (client, transport) = client();

        for _ in 0..2 {
            let params = GameDetailsParams { id: 13, ..Default::default() };
            let json = result_json(&details_impl(&client, params).await.unwrap());
            assert_eq!(json["data"]["name"], "Game 13");
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        let params = GameDetailsParams { id: 13, force_refresh: true, ..Default::default() };
        details_impl(&client, params).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_negative_id_rejected_by_schema() {
        let parsed: Result<GameDetailsParams, _> = serde_json::from_value(serde_json::json!({ "id": -4 }));
        assert!(parsed.is_err());
    }
}
