//! Request validation and upstream endpoint construction.

use url::Url;

use super::CatalogError;
use super::types::GameType;
use crate::throttle::RateLimitScope;

/// Longest accepted search query, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

/// Most ids upstream accepts in one `thing` request.
pub const MAX_IDS_PER_REQUEST: usize = 20;

/// Per-call options for the `*_with` client methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Quota the call is charged to.
    pub scope: RateLimitScope,
    /// Skip a cached entry and fetch again (joining a fetch already in flight).
    pub force_refresh: bool,
}

impl RequestOptions {
    pub fn for_scope(scope: RateLimitScope) -> Self {
        Self { scope, force_refresh: false }
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

/// Trimmed query, or an error if it is blank or too long.
pub fn validate_query(query: &str) -> Result<&str, CatalogError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::InvalidInput("query cannot be empty".to_string()));
    }

    let chars = trimmed.chars().count();
    if chars > MAX_QUERY_CHARS {
        return Err(CatalogError::InvalidInput(format!("query too long: {chars} chars (max {MAX_QUERY_CHARS})")));
    }

    Ok(trimmed)
}

pub fn validate_id(id: u32) -> Result<u32, CatalogError> {
    if id == 0 {
        return Err(CatalogError::InvalidInput("game id must be positive".to_string()));
    }
    Ok(id)
}

/// Sorted, deduplicated ids, or an error if the list is empty or holds a zero.
pub fn validate_ids(ids: &[u32]) -> Result<Vec<u32>, CatalogError> {
    if ids.is_empty() {
        return Err(CatalogError::InvalidInput("at least one game id is required".to_string()));
    }
    let mut ids = ids.iter().copied().map(validate_id).collect::<Result<Vec<_>, _>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

fn endpoint(base_url: &str, path: &str) -> Result<Url, CatalogError> {
    let raw = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|e| CatalogError::InvalidInput(format!("invalid catalog base URL {base_url}: {e}")))
}

/// `{base}/search?query=<q>&type=<t>[&exact=1]`
pub fn search_url(base_url: &str, query: &str, game_type: GameType, exact: bool) -> Result<Url, CatalogError> {
    let mut url = endpoint(base_url, "search")?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("query", query).append_pair("type", game_type.as_api_str());
        if exact {
            pairs.append_pair("exact", "1");
        }
    }
    Ok(url)
}

/// `{base}/thing?id=<id,id,...>&stats=1`
pub fn thing_url(base_url: &str, ids: &[u32]) -> Result<Url, CatalogError> {
    let joined = ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
    let mut url = endpoint(base_url, "thing")?;
    url.query_pairs_mut().append_pair("id", &joined).append_pair("stats", "1");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://boardgamegeek.com/xmlapi2";

    #[test]
    fn test_validate_query() {
        assert_eq!(validate_query("  catan ").unwrap(), "catan");
        assert!(matches!(validate_query(""), Err(CatalogError::InvalidInput(_))));
        assert!(matches!(validate_query(" \t\n"), Err(CatalogError::InvalidInput(_))));
        assert!(validate_query(&"a".repeat(200)).is_ok());
        assert!(matches!(validate_query(&"a".repeat(201)), Err(CatalogError::InvalidInput(_))));
    }

    #[test]
    fn test_query_length_counts_chars() {
        assert!(validate_query(&"é".repeat(200)).is_ok());
    }

    #[test]
    fn test_validate_ids() {
        assert_eq!(validate_ids(&[822, 13, 822]).unwrap(), vec![13, 822]);
        assert!(matches!(validate_ids(&[]), Err(CatalogError::InvalidInput(_))));
        assert!(matches!(validate_ids(&[13, 0]), Err(CatalogError::InvalidInput(_))));
        assert!(matches!(validate_id(0), Err(CatalogError::InvalidInput(_))));
    }

    #[test]
    fn test_search_url() {
        let url = search_url(BASE, "catan dice", GameType::BoardGame, false).unwrap();
        assert_eq!(url.as_str(), "https://boardgamegeek.com/xmlapi2/search?query=catan+dice&type=boardgame");

        let url = search_url(&format!("{BASE}/"), "catan", GameType::Expansion, true).unwrap();
        assert_eq!(url.as_str(), "https://boardgamegeek.com/xmlapi2/search?query=catan&type=boardgameexpansion&exact=1");
    }

    #[test]
    fn test_thing_url() {
        let url = thing_url(BASE, &[13, 822]).unwrap();
        assert_eq!(url.path(), "/xmlapi2/thing");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("id".into(), "13,822".into()), ("stats".into(), "1".into())]);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(thing_url("not a url", &[1]), Err(CatalogError::InvalidInput(_))));
    }

    #[test]
    fn test_request_options() {
        let options = RequestOptions::for_scope(RateLimitScope::User("a".into())).force_refresh(true);
        assert!(options.force_refresh);
        assert_eq!(RequestOptions::default().scope, RateLimitScope::Anonymous);
    }
}
