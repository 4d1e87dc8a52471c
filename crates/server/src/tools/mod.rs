//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mcp-meeple server.

pub mod cache;
pub mod game_batch;
pub mod game_details;
pub mod game_find;
pub mod game_search;

use meeple_core::ApiResponse;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Render an envelope as pretty JSON; failed envelopes are flagged as tool errors.
pub(crate) fn envelope_result<T: Serialize>(response: &ApiResponse<T>) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| McpError::internal_error(format!("failed to serialize output: {e}"), None))?;

    if response.success {
        Ok(CallToolResult::success(vec![Content::text(json)]))
    } else {
        Ok(CallToolResult::error(vec![Content::text(json)]))
    }
}

/// Render any serializable value as a successful tool result.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| McpError::internal_error(format!("failed to serialize output: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use meeple_client::{CatalogClient, CatalogError, XmlTransport};
    use meeple_core::AppConfig;
    use rmcp::model::CallToolResult;
    use url::Url;

    /// Answers `/search` and `/thing` from canned documents.
    pub struct CannedTransport {
        pub search_xml: String,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl XmlTransport for CannedTransport {
        async fn get(&self, url: &Url) -> Result<String, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.path().ends_with("/search") {
                return Ok(self.search_xml.clone());
            }
            let ids = url.query_pairs().find(|(k, _)| k == "id").map(|(_, v)| v.into_owned()).unwrap_or_default();
            let items: String = ids
                .split(',')
                .filter_map(|id| id.parse::<u32>().ok())
                .map(|id| {
                    format!(r#"<item type="boardgame" id="{id}"><name type="primary" value="Game {id}" /></item>"#)
                })
                .collect();
            Ok(format!("<items>{items}</items>"))
        }
    }

    pub fn catan_search_xml() -> String {
        r#"<items total="2">
            <item type="boardgame" id="278"><name type="primary" value="Catan Card Game" /><yearpublished value="1996" /></item>
            <item type="boardgame" id="13"><name type="primary" value="Catan" /><yearpublished value="1995" /></item>
        </items>"#
            .to_string()
    }

    pub fn client() -> (CatalogClient, Arc<CannedTransport>) {
        let transport = Arc::new(CannedTransport { search_xml: catan_search_xml(), calls: AtomicUsize::new(0) });
        let config = AppConfig { min_request_interval_ms: 0, ..Default::default() };
        (CatalogClient::with_transport(&config, Arc::clone(&transport) as Arc<dyn XmlTransport>), transport)
    }

    pub fn result_json(result: &CallToolResult) -> serde_json::Value {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
