//! Board game catalog client.
//!
//! Resolves game metadata by name or id against the upstream XML API while
//! shielding callers from its latency, rate limits and flakiness.
//!
//! ### Request path
//!
//! caller → cache (hit returns at once; concurrent misses share one fetch)
//! → throttle (quota may reject, spacing may delay) → retry (backoff on
//! transient failures, spacing re-applied per attempt) → transport → normalizer.
//!
//! ### Endpoints
//!
//! - **Search**: `{base}/search?query=<q>&type=<type>[&exact=1]`
//! - **Details**: `{base}/thing?id=<id,...>&stats=1`, at most 20 ids per request
//!
//! Every public operation returns an [`ApiResponse`] envelope and never panics.

pub mod description;
pub mod error;
pub mod normalize;
pub mod request;
pub mod types;
pub mod xml;

pub use description::clean_description;
pub use error::CatalogError;
pub use normalize::{parse_game_details, parse_game_list, parse_search_results, rank_results};
pub use request::{MAX_IDS_PER_REQUEST, MAX_QUERY_CHARS, RequestOptions};
pub use types::{GameDetails, GameType, SearchResult};

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use meeple_core::{ApiResponse, AppConfig, CacheKey, Error, ResponseCache};
use tokio::time::Instant;
use url::Url;

use crate::fetch::{HttpTransport, TransportConfig, XmlTransport};
use crate::retry::{RetryPolicy, retry};
use crate::throttle::{RateLimitScope, Throttle, ThrottleConfig};
use request::{search_url, thing_url, validate_id, validate_ids, validate_query};

/// Catalog client. Cheap to clone; clones share cache, throttle and transport.
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn XmlTransport>,
    cache: ResponseCache,
    throttle: Throttle,
    retry_policy: RetryPolicy,
    base_url: Arc<str>,
}

impl CatalogClient {
    /// Create a client that talks HTTP to `config.base_url`.
    pub fn new(config: &AppConfig) -> Result<Self, CatalogError> {
        let transport = HttpTransport::new(&TransportConfig::from(config))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: &AppConfig, transport: Arc<dyn XmlTransport>) -> Self {
        Self::from_parts(
            &config.base_url,
            transport,
            ResponseCache::new(config.cache_config()),
            Throttle::new(ThrottleConfig::from(config)),
            RetryPolicy::from(config),
        )
    }

    /// Assemble a client from explicitly constructed components.
    pub fn from_parts(
        base_url: &str, transport: Arc<dyn XmlTransport>, cache: ResponseCache, throttle: Throttle,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self { transport, cache, throttle, retry_policy, base_url: Arc::from(base_url) }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Drop every cached entry and in-flight record. Returns the number of entries dropped.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    /// Search the catalog by name.
    pub async fn search_games(
        &self, query: &str, game_type: GameType, exact: bool, scope: RateLimitScope,
    ) -> ApiResponse<Vec<SearchResult>> {
        self.search_games_with(query, game_type, exact, RequestOptions::for_scope(scope)).await
    }

    pub async fn search_games_with(
        &self, query: &str, game_type: GameType, exact: bool, options: RequestOptions,
    ) -> ApiResponse<Vec<SearchResult>> {
        let result = self.search(query, game_type, exact, &options).await;
        respond("search_games", result.map(|results| results.as_ref().clone()))
    }

    /// Fetch full metadata for one game.
    pub async fn get_game_details(&self, id: u32, scope: RateLimitScope) -> ApiResponse<GameDetails> {
        self.get_game_details_with(id, RequestOptions::for_scope(scope)).await
    }

    pub async fn get_game_details_with(&self, id: u32, options: RequestOptions) -> ApiResponse<GameDetails> {
        let result = self.details(id, &options).await;
        respond("get_game_details", result.map(|details| details.as_ref().clone()))
    }

    /// Fetch metadata for several games, best effort.
    ///
    /// Ids are deduplicated and sorted; the result follows that order and
    /// leaves out games that could not be fetched or parsed. Fails only when
    /// nothing could be returned.
    pub async fn get_multiple_games(&self, ids: &[u32], scope: RateLimitScope) -> ApiResponse<Vec<GameDetails>> {
        self.get_multiple_games_with(ids, RequestOptions::for_scope(scope)).await
    }

    pub async fn get_multiple_games_with(&self, ids: &[u32], options: RequestOptions) -> ApiResponse<Vec<GameDetails>> {
        respond("get_multiple_games", self.multiple(ids, &options).await)
    }

    /// Resolve a name to the best matching game: exact match first, then the
    /// top ranked fuzzy match.
    pub async fn find_game(&self, name: &str, scope: RateLimitScope) -> ApiResponse<GameDetails> {
        self.find_game_with(name, RequestOptions::for_scope(scope)).await
    }

    pub async fn find_game_with(&self, name: &str, options: RequestOptions) -> ApiResponse<GameDetails> {
        let result = self.find(name, &options).await;
        respond("find_game", result.map(|details| details.as_ref().clone()))
    }

    async fn search(
        &self, query: &str, game_type: GameType, exact: bool, options: &RequestOptions,
    ) -> Result<Arc<Vec<SearchResult>>, CatalogError> {
        let query = validate_query(query)?.to_string();
        let key = CacheKey::search(game_type.as_api_str(), &query, exact);
        let url = search_url(&self.base_url, &query, game_type, exact)?;

        let this = self.clone();
        let scope = options.scope.clone();
        self.cache
            .get_or_fetch(&key, options.force_refresh, move || async move {
                let xml = this.fetch_xml(&url, &scope).await?;
                parse_search_results(&xml, Some(&query))
            })
            .await
            .map_err(CatalogError::from)
    }

    async fn details(&self, id: u32, options: &RequestOptions) -> Result<Arc<GameDetails>, CatalogError> {
        let id = validate_id(id)?;
        let url = thing_url(&self.base_url, &[id])?;

        let this = self.clone();
        let scope = options.scope.clone();
        self.cache
            .get_or_fetch(&CacheKey::game(id), options.force_refresh, move || async move {
                let xml = this.fetch_xml(&url, &scope).await?;
                parse_game_details(&xml)?.ok_or_else(|| CatalogError::NotFound(format!("no game with id {id}")))
            })
            .await
            .map_err(CatalogError::from)
    }

    async fn multiple(&self, ids: &[u32], options: &RequestOptions) -> Result<Vec<GameDetails>, CatalogError> {
        let ids = validate_ids(ids)?;
        let mut found: BTreeMap<u32, GameDetails> = BTreeMap::new();
        let mut missing = Vec::new();

        for id in ids.iter().copied() {
            match self.cache.get::<GameDetails>(&CacheKey::game(id)) {
                Some(details) if !options.force_refresh => {
                    found.insert(id, details.as_ref().clone());
                }
                _ => missing.push(id),
            }
        }

        let chunks = missing.chunks(MAX_IDS_PER_REQUEST).map(|chunk| self.chunk(chunk.to_vec(), options));
        let mut first_error = None;
        for outcome in join_all(chunks).await {
            match outcome {
                Ok(games) => {
                    for game in games.iter() {
                        found.insert(game.id, game.clone());
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping failed batch chunk");
                    first_error.get_or_insert(err);
                }
            }
        }

        if found.is_empty()
            && let Some(err) = first_error
        {
            return Err(err);
        }
        if found.len() < ids.len() {
            tracing::debug!(requested = ids.len(), returned = found.len(), "partial batch result");
        }

        Ok(found.into_values().collect())
    }

    /// Fetch one chunk of at most [`MAX_IDS_PER_REQUEST`] ids, priming the
    /// per-game cache entries with every parsed game.
    async fn chunk(&self, ids: Vec<u32>, options: &RequestOptions) -> Result<Arc<Vec<GameDetails>>, CatalogError> {
        let key = CacheKey::games(&ids);
        let url = thing_url(&self.base_url, &ids)?;

        let this = self.clone();
        let scope = options.scope.clone();
        self.cache
            .get_or_fetch(&key, options.force_refresh, move || async move {
                let xml = this.fetch_xml(&url, &scope).await?;
                let mut games = Vec::new();
                let mut first_error = None;
                for parsed in parse_game_list(&xml) {
                    match parsed {
                        Ok(game) => {
                            this.cache.insert(&CacheKey::game(game.id), game.clone());
                            games.push(game);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "skipping unparsable item in batch");
                            first_error.get_or_insert(err);
                        }
                    }
                }
                match first_error {
                    Some(err) if games.is_empty() => Err(err),
                    _ => Ok(games),
                }
            })
            .await
            .map_err(CatalogError::from)
    }

    async fn find(&self, name: &str, options: &RequestOptions) -> Result<Arc<GameDetails>, CatalogError> {
        let name = validate_query(name)?;

        let exact = self.search(name, GameType::BoardGame, true, options).await?;
        let best = match exact.first() {
            Some(hit) => hit.id,
            None => {
                tracing::debug!(query = name, "no exact match, falling back to fuzzy search");
                let fuzzy = self.search(name, GameType::BoardGame, false, options).await?;
                fuzzy
                    .first()
                    .map(|hit| hit.id)
                    .ok_or_else(|| CatalogError::NotFound(format!("no game matches {name:?}")))?
            }
        };

        self.details(best, options).await
    }

    /// One logical upstream call: quota charged once, spacing applied to
    /// every attempt, transient failures retried.
    async fn fetch_xml(&self, url: &Url, scope: &RateLimitScope) -> Result<String, CatalogError> {
        let start = Instant::now();
        let result = self
            .throttle
            .execute(scope, || async {
                retry(
                    &self.retry_policy,
                    |err: &CatalogError, _| err.is_retryable(),
                    |attempt| async move {
                        if attempt > 1 {
                            self.throttle.pace().await;
                        }
                        self.transport.get(url).await
                    },
                )
                .await
                .map_err(CatalogError::from)
            })
            .await;

        tracing::debug!(
            url = %url,
            scope = %scope,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "upstream call finished"
        );
        result
    }
}

fn respond<T>(operation: &str, result: Result<T, CatalogError>) -> ApiResponse<T> {
    match result {
        Ok(data) => ApiResponse::ok(data),
        Err(err) => {
            tracing::warn!(operation, error = %err, "catalog request failed");
            ApiResponse::from_error(&Error::from(err))
        }
    }
}
