//! Harvester: a resumable sitemap and page crawler
//!
//! This crate implements a priority-ordered, deduplicating crawler that walks
//! sitemaps and pages through configurable per-pattern handlers, stores
//! fetched artifacts under content addresses, and checkpoints its frontier so
//! an interrupted crawl can pick up where it stopped.

pub mod config;
pub mod crawler;
pub mod dispatcher;
pub mod download;
pub mod frontier;
pub mod handlers;
pub mod storage;
pub mod url;
pub mod xml;

use thiserror::Error;

pub use crawler::FetchError;
pub use dispatcher::DispatchError;
pub use frontier::FrontierError;
pub use handlers::HandlerError;

/// Main error type for Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] FrontierError),

    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted after {processed} pages; frontier checkpointed")]
    Interrupted { processed: u64 },
}

/// Configuration-specific errors
///
/// All of these are raised before any network activity starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid XPath '{expression}': {message}")]
    InvalidXPath { expression: String, message: String },

    #[error("Invalid override '{0}': {1}")]
    Override(String, String),
}

/// Result type alias for Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlReport};
pub use frontier::Frontier;
pub use crate::url::canonicalize;
