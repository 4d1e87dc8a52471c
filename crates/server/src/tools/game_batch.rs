//! game_batch tool implementation.
//!
//! Fetches several games at once; partial results are returned when some ids fail.

use meeple_client::{CatalogClient, RateLimitScope};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::envelope_result;

/// Input parameters for game_batch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GameBatchParams {
    /// Catalog ids; duplicates are ignored.
    pub ids: Vec<u32>,

    /// Caller id the request is charged to; anonymous when omitted.
    #[serde(default)]
    pub caller: Option<String>,
}

/// Implementation of the game_batch tool.
pub async fn batch_impl(client: &CatalogClient, params: GameBatchParams) -> Result<CallToolResult, McpError> {
    let scope = RateLimitScope::from_caller(params.caller.as_deref());
    envelope_result(&client.get_multiple_games(&params.ids, scope).await)
}
