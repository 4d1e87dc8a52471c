//! Deterministic cache key construction.
//!
//! Keys are plain strings so they can be logged and purged by prefix:
//!
//! - `search:<type>:<query>` and `search:exact:<type>:<query>`
//! - `game:<id>`
//! - `games:<id>,<id>,...`
//!
//! Queries are trimmed, lowercased and have inner whitespace runs collapsed, so
//! `"Catan"`, `" catan "` and `"CATAN"` share one key.

use std::fmt;

use serde::Serialize;

/// Prefix shared by every search key.
pub const SEARCH_PREFIX: &str = "search:";

/// Prefix of single-game detail keys.
pub const GAME_PREFIX: &str = "game:";

/// Prefix of multi-game detail keys.
pub const GAMES_PREFIX: &str = "games:";

/// TTL category of a key, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCategory {
    /// Search results; change as the catalog is re-indexed.
    Search,
    /// Game metadata; close to static.
    Detail,
    /// Anything else.
    Other,
}

/// A cache key built from an operation and its normalized input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a search by `game_type`.
    pub fn search(game_type: &str, query: &str, exact: bool) -> Self {
        let query = normalize_query(query);
        if exact {
            Self(format!("{SEARCH_PREFIX}exact:{game_type}:{query}"))
        } else {
            Self(format!("{SEARCH_PREFIX}{game_type}:{query}"))
        }
    }

    /// Key for the details of a single game.
    pub fn game(id: u32) -> Self {
        Self(format!("{GAME_PREFIX}{id}"))
    }

    /// Key for a batch of games; order and duplicates in `ids` do not matter.
    pub fn games(ids: &[u32]) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        let joined = ids.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        Self(format!("{GAMES_PREFIX}{joined}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Category of a raw key string.
pub fn category_of(key: &str) -> KeyCategory {
    if key.starts_with(SEARCH_PREFIX) {
        KeyCategory::Search
    } else if key.starts_with(GAME_PREFIX) || key.starts_with(GAMES_PREFIX) {
        KeyCategory::Detail
    } else {
        KeyCategory::Other
    }
}

/// Normalize a free-text query for keying.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_format() {
        assert_eq!(CacheKey::search("boardgame", "catan", false).as_str(), "search:boardgame:catan");
        assert_eq!(CacheKey::search("boardgame", "catan", true).as_str(), "search:exact:boardgame:catan");
    }

    #[test]
    fn test_search_key_ignores_case_and_whitespace() {
        let expected = CacheKey::search("boardgame", "catan", false);
        for variant in ["Catan", " catan ", "CATAN", "\tCatan\n"] {
            assert_eq!(CacheKey::search("boardgame", variant, false), expected, "variant {variant:?}");
        }
    }

    #[test]
    fn test_search_key_collapses_inner_whitespace() {
        assert_eq!(
            CacheKey::search("boardgame", "Catan   Dice  Game", false).as_str(),
            "search:boardgame:catan dice game"
        );
    }

    #[test]
    fn test_exact_and_fuzzy_keys_differ() {
        assert_ne!(CacheKey::search("boardgame", "exact:catan", false), CacheKey::search("boardgame", "catan", true));
    }

    #[test]
    fn test_games_key_sorted_and_deduplicated() {
        assert_eq!(CacheKey::games(&[822, 13, 822, 9209]).as_str(), "games:13,822,9209");
        assert_eq!(CacheKey::games(&[9209, 13, 822]), CacheKey::games(&[13, 822, 9209]));
    }

    #[test]
    fn test_categories() {
        assert_eq!(category_of(CacheKey::search("boardgame", "x", false).as_str()), KeyCategory::Search);
        assert_eq!(category_of(CacheKey::game(13).as_str()), KeyCategory::Detail);
        assert_eq!(category_of(CacheKey::games(&[1, 2]).as_str()), KeyCategory::Detail);
        assert_eq!(category_of("hot:list"), KeyCategory::Other);
    }
}
