//! Core types and shared functionality for meeple.
//!
//! This crate provides:
//! - In-memory response cache with singleflight request coalescing
//! - Unified error types and the result envelope
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod response;

pub use cache::{CacheConfig, CacheError, CacheKey, CacheStats, ResponseCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use response::ApiResponse;
