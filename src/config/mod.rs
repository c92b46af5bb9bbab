//! Configuration module for Harvester
//!
//! This module handles loading, overriding, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use harvester::config::load_config_with_overrides;
//! use std::path::Path;
//!
//! let overrides = vec!["frontier.max-pages=50".to_string()];
//! let config = load_config_with_overrides(Path::new("crawl.toml"), &overrides).unwrap();
//! println!("Crawl budget: {:?}", config.frontier.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetcherConfig, FrontierConfig, HandlerEntry, HandlerKind,
    ScraperApiConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_config_with_overrides,
    parse_config,
};
