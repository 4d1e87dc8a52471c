//! Conversion of upstream XML into domain records, with relevance ranking.

use std::cmp::{Ordering, Reverse};

use super::description::clean_description;
use super::types::{GameDetails, GameType, SearchResult};
use super::xml::{Element, LinkKind, RawItem, parse_document};
use super::CatalogError;

/// Rank entry holding the overall board game rank.
const OVERALL_RANK: &str = "boardgame";

/// Parse the root of a response, turning upstream error documents into errors.
fn parse_items(xml: &str) -> Result<Element, CatalogError> {
    let root = parse_document(xml)?;
    match root.name.as_str() {
        "items" => Ok(root),
        "error" | "errors" => {
            let message = find_text(&root, "message").unwrap_or("upstream returned an error document");
            Err(CatalogError::Upstream(message.to_string()))
        }
        other => Err(CatalogError::Parse(format!("unexpected root element <{other}>"))),
    }
}

fn find_text<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    if element.name == name && !element.text.trim().is_empty() {
        return Some(element.text.trim());
    }
    element.children.iter().find_map(|child| find_text(child, name))
}

/// Parse a search response into results.
///
/// Items lacking an id or a name are skipped. When `original_query` is given
/// the results are ranked: exact case-insensitive name match, then prefix
/// match, then substring match, then newest first (unknown years last), then
/// by name. Without a query the upstream order is kept.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed XML and `CatalogError::Upstream`
/// for an upstream error document.
pub fn parse_search_results(xml: &str, original_query: Option<&str>) -> Result<Vec<SearchResult>, CatalogError> {
    let root = parse_items(xml)?;

    let mut results: Vec<SearchResult> = root
        .children_named("item")
        .map(RawItem::from_element)
        .filter_map(|raw| {
            let id = raw.id?;
            let name = raw.primary_name()?.to_string();
            let game_type = raw.item_type.as_deref().and_then(GameType::from_api_str).unwrap_or_default();
            Some(SearchResult { id, name, year_published: raw.year_published, game_type })
        })
        .collect();

    if let Some(query) = original_query {
        rank_results(&mut results, query);
    }

    Ok(results)
}

/// How closely a name matches a lowercased query; lower is better.
fn match_tier(name: &str, query: &str) -> u8 {
    if query.is_empty() {
        return 3;
    }
    let name = name.to_lowercase();
    if name == query {
        0
    } else if name.starts_with(query) {
        1
    } else if name.contains(query) {
        2
    } else {
        3
    }
}

/// Sort results by relevance to `query`. The sort is stable.
pub fn rank_results(results: &mut [SearchResult], query: &str) {
    let query = query.trim().to_lowercase();
    results.sort_by(|a, b| {
        match_tier(&a.name, &query)
            .cmp(&match_tier(&b.name, &query))
            .then_with(|| compare_years(a.year_published, b.year_published))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Newest first; unknown years sort after every known year.
fn compare_years(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => Reverse(a).cmp(&Reverse(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn details_from_raw(raw: RawItem) -> Result<GameDetails, CatalogError> {
    let id = raw.id.ok_or_else(|| CatalogError::Parse("item has no id".to_string()))?;
    let name = raw
        .primary_name()
        .ok_or_else(|| CatalogError::Parse(format!("item {id} has no name")))?
        .to_string();

    let (average_rating, bgg_rating, users_rated, rank) = match &raw.ratings {
        Some(ratings) => (
            ratings.average,
            ratings.bayes_average,
            ratings.users_rated,
            ratings.ranks.iter().find(|rank| rank.name == OVERALL_RANK).and_then(|rank| rank.value),
        ),
        None => (None, None, None, None),
    };

    Ok(GameDetails {
        id,
        name,
        description: raw.description.as_deref().map(clean_description).unwrap_or_default(),
        categories: raw.link_values(&LinkKind::Category),
        mechanics: raw.link_values(&LinkKind::Mechanic),
        designers: raw.link_values(&LinkKind::Designer),
        publishers: raw.link_values(&LinkKind::Publisher),
        image: raw.image,
        thumbnail: raw.thumbnail,
        year_published: raw.year_published,
        min_players: raw.min_players,
        max_players: raw.max_players,
        playing_time: raw.playing_time,
        min_playing_time: raw.min_playing_time,
        max_playing_time: raw.max_playing_time,
        min_age: raw.min_age,
        average_rating,
        bgg_rating,
        users_rated,
        rank,
    })
}

/// Parse a single-item details response. `Ok(None)` when it holds no item.
///
/// # Errors
///
/// Returns `CatalogError::Parse` for malformed XML or an item without id or
/// name, and `CatalogError::Upstream` for an upstream error document.
pub fn parse_game_details(xml: &str) -> Result<Option<GameDetails>, CatalogError> {
    let root = parse_items(xml)?;
    root.child("item").map(|item| details_from_raw(RawItem::from_element(item))).transpose()
}

/// Parse a multi-item details response, one result per item.
///
/// A malformed document yields a single error entry.
pub fn parse_game_list(xml: &str) -> Vec<Result<GameDetails, CatalogError>> {
    match parse_items(xml) {
        Ok(root) => root.children_named("item").map(|item| details_from_raw(RawItem::from_element(item))).collect(),
        Err(e) => vec![Err(e)],
    }
}
