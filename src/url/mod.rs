//! URL handling module for Harvester
//!
//! This module provides fragment-stripping canonicalization for dedup,
//! path-suffix extension detection for artifact names, and priority class
//! assignment from configured patterns.

mod canonical;
mod priority;

// Re-export main functions
pub use canonical::{canonicalize, path_extension};
pub use priority::PriorityMatcher;

/// Returns true if the URL uses the local `file` scheme
pub fn is_file_url(url: &str) -> bool {
    url.get(..5)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("file:"))
}
