//! Domain records produced by the normalizer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::CatalogError;

/// Catalog item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    #[default]
    BoardGame,
    Expansion,
    Accessory,
}

impl GameType {
    /// Value of the upstream `type` parameter and attribute.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            GameType::BoardGame => "boardgame",
            GameType::Expansion => "boardgameexpansion",
            GameType::Accessory => "boardgameaccessory",
        }
    }

    /// Inverse of [`GameType::as_api_str`].
    pub fn from_api_str(value: &str) -> Option<Self> {
        match value {
            "boardgame" => Some(GameType::BoardGame),
            "boardgameexpansion" => Some(GameType::Expansion),
            "boardgameaccessory" => Some(GameType::Accessory),
            _ => None,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_api_str())
    }
}

impl FromStr for GameType {
    type Err = CatalogError;

    /// Accepts both the short names (`expansion`) and the upstream names (`boardgameexpansion`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "expansion" => Ok(GameType::Expansion),
            "accessory" => Ok(GameType::Accessory),
            other => GameType::from_api_str(other)
                .ok_or_else(|| CatalogError::InvalidInput(format!("unknown game type: {s}"))),
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_published: Option<i32>,
    #[serde(rename = "type")]
    pub game_type: GameType,
}

/// Full metadata for one game.
///
/// Optional fields are `None` when upstream omits them, which means unknown
/// rather than zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDetails {
    pub id: u32,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_published: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_players: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playing_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_playing_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_playing_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mechanics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub designers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub publishers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgg_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_rated: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_parsing() {
        assert_eq!("boardgame".parse::<GameType>().unwrap(), GameType::BoardGame);
        assert_eq!("Expansion".parse::<GameType>().unwrap(), GameType::Expansion);
        assert_eq!("boardgameaccessory".parse::<GameType>().unwrap(), GameType::Accessory);
        assert!(matches!("rpg".parse::<GameType>(), Err(CatalogError::InvalidInput(_))));
    }

    #[test]
    fn test_game_type_api_round_trip() {
        for kind in [GameType::BoardGame, GameType::Expansion, GameType::Accessory] {
            assert_eq!(GameType::from_api_str(kind.as_api_str()), Some(kind));
        }
    }

    #[test]
    fn test_search_result_serialization() {
        let result = SearchResult { id: 13, name: "Catan".into(), year_published: None, game_type: GameType::Expansion };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 13, "name": "Catan", "type": "expansion" }));
    }

    #[test]
    fn test_game_details_omits_absent_fields() {
        let details = GameDetails {
            id: 1,
            name: "Tiny".into(),
            description: String::new(),
            image: None,
            thumbnail: None,
            year_published: None,
            min_players: Some(0),
            max_players: None,
            playing_time: None,
            min_playing_time: None,
            max_playing_time: None,
            min_age: None,
            categories: Vec::new(),
            mechanics: Vec::new(),
            designers: Vec::new(),
            publishers: Vec::new(),
            average_rating: None,
            bgg_rating: None,
            users_rated: None,
            rank: None,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 1, "name": "Tiny", "description": "", "min_players": 0 }));
    }
}
