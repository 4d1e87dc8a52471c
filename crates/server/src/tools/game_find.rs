//! game_find tool implementation.
//!
//! Resolves a free-text name to the single best matching game.

use meeple_client::{CatalogClient, RateLimitScope};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::envelope_result;

/// Input parameters for game_find tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GameFindParams {
    /// Game name to resolve.
    pub name: String,

    /// Caller id the request is charged to; anonymous when omitted.
    #[serde(default)]
    pub caller: Option<String>,
}

/// Implementation of the game_find tool.
pub async fn find_impl(client: &CatalogClient, params: GameFindParams) -> Result<CallToolResult, McpError> {
    let scope = RateLimitScope::from_caller(params.caller.as_deref());
    envelope_result(&client.find_game(&params.name, scope).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{client, result_json};

    #[tokio::test]
    async fn test_find_returns_best_match_details() {
        let (client, _) = client();
        let params = GameFindParams { name: "Catan".into(), caller: None };

        let json = result_json(&find_impl(&client, params).await.unwrap());
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 13);
    }
}
