//! Storage module for fetched artifacts
//!
//! Artifacts are written to the dump directory under a content address
//! derived from their URL, and each stored URL is appended to `index.txt`
//! for downstream consumers.

mod sink;

pub use sink::{file_name_for, ArtifactSink, INDEX_FILE};
