//! XML support for sitemap handlers
//!
//! Sitemaps are parsed into a small element tree ([`Document`]) and queried
//! with a subset of XPath ([`XPath`]) configured per handler.

mod path;
mod tree;

pub use path::{Selection, XPath};
pub use tree::{Document, Element, Node, MAX_DEPTH};

use thiserror::Error;

/// Errors raised while parsing XML content
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("Malformed XML: {0}")]
    Malformed(String),
}
