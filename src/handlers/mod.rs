//! Handler module: per-URL-pattern content processing
//!
//! This module provides:
//! - `Handler`: turns a fetched page into follow-up URLs
//! - `HandlerRegistry`: the ordered pattern list built from configuration
//! - Built-in handlers for sitemaps, gzip product sitemaps, raw dumps and
//!   HTML link discovery

mod dump;
mod links;
mod products;
mod sitemap;

pub use dump::DumpHandler;
pub use links::LinksHandler;
pub use products::{decompress, ProductsHandler};
pub use sitemap::SitemapHandler;

use crate::config::{HandlerEntry, HandlerKind};
use crate::crawler::FetchedPage;
use crate::storage::ArtifactSink;
use crate::xml::{XPath, XmlError};
use crate::ConfigError;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while handling fetched content
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Xml(#[from] XmlError),

    #[error("Failed to decompress gzip payload: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("Refusing to store {url}: redirected to {final_url}")]
    Redirected { url: String, final_url: String },

    #[error("Invalid page URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to store artifact: {0}")]
    Store(#[source] std::io::Error),
}

/// Processes the content of one fetched page
///
/// Handlers are shared between workers and must not hold per-page state.
pub trait Handler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Returns the URLs discovered in `page`, in document order
    fn handle(&self, page: &FetchedPage) -> Result<Vec<String>, HandlerError>;
}

/// Rejects a redirected page unless redirects are allowed
pub(crate) fn check_redirect(page: &FetchedPage, allow_redirects: bool) -> Result<(), HandlerError> {
    if page.was_redirected() && !allow_redirects {
        return Err(HandlerError::Redirected {
            url: page.url.clone(),
            final_url: page.final_url.clone(),
        });
    }
    Ok(())
}

/// Ordered list of compiled patterns and their handlers
pub struct HandlerRegistry {
    entries: Vec<(Regex, Box<dyn Handler>)>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.entries
                    .iter()
                    .map(|(pattern, handler)| (pattern.as_str(), handler.name())),
            )
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builds the registry from configured entries
    ///
    /// # Arguments
    ///
    /// * `entries` - Handler entries in priority order
    /// * `sink` - Artifact sink shared by the storing handlers
    ///
    /// # Returns
    ///
    /// * `Ok(HandlerRegistry)` - Every pattern and XPath compiled
    /// * `Err(ConfigError)` - The first invalid pattern, XPath or base URL
    pub fn from_config(
        entries: &[HandlerEntry],
        sink: Arc<ArtifactSink>,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();

        for entry in entries {
            let handler: Box<dyn Handler> = match &entry.kind {
                HandlerKind::Sitemap { xpath } => Box::new(SitemapHandler::new(XPath::parse(xpath)?)),
                HandlerKind::ProductsGz {
                    xpath,
                    url_xpath,
                    image_xpath,
                } => Box::new(ProductsHandler::new(
                    XPath::parse(xpath)?,
                    XPath::parse(url_xpath)?,
                    image_xpath.as_deref().map(XPath::parse).transpose()?,
                )),
                HandlerKind::Dump { allow_redirects } => {
                    Box::new(DumpHandler::new(Arc::clone(&sink), *allow_redirects))
                }
                HandlerKind::Links {
                    base_url,
                    store,
                    allow_redirects,
                } => {
                    let sink = store.then(|| Arc::clone(&sink));
                    Box::new(LinksHandler::new(base_url.clone(), sink, *allow_redirects))
                }
            };
            registry.register(&entry.pattern, handler)?;
        }

        Ok(registry)
    }

    /// Appends a handler for an unanchored pattern
    pub fn register(&mut self, pattern: &str, handler: Box<dyn Handler>) -> Result<(), ConfigError> {
        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.entries.push((regex, handler));
        Ok(())
    }

    /// The first handler whose pattern occurs anywhere in `url`
    pub fn find(&self, url: &str) -> Option<&dyn Handler> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.is_match(url))
            .map(|(_, handler)| handler.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
