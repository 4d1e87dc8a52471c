//! Client code for meeple.
//!
//! This crate provides the board game catalog client and the resilience
//! pieces it composes: the XML transport, the outbound throttle, the retry
//! controller and the XML normalizer.

pub mod catalog;
pub mod fetch;
pub mod retry;
pub mod throttle;

pub use catalog::{
    CatalogClient, CatalogError, GameDetails, GameType, RequestOptions, SearchResult, clean_description,
    parse_game_details, parse_game_list, parse_search_results,
};
pub use fetch::{HttpTransport, TransportConfig, XmlTransport};
pub use retry::{RetryError, RetryPolicy, retry};
pub use throttle::{RateLimitScope, Throttle, ThrottleConfig, ThrottleError, ThrottlePermit};
