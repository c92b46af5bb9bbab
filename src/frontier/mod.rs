//! Frontier module: the crawler's to-visit queue
//!
//! This module provides:
//! - `Frontier`: priority-bucketed, deduplicated FIFO queues with a crawl budget
//! - `FrontierState`: the persisted checkpoint record
//! - `CheckpointGuard`: scoped ownership that restores on open and checkpoints once on exit

mod checkpoint;
mod queue;

pub use checkpoint::{CheckpointGuard, FrontierState};
pub use queue::{Frontier, FrontierStats};

use thiserror::Error;

/// Errors raised by the frontier and its checkpoint file
#[derive(Debug, Error)]
pub enum FrontierError {
    /// `pop` was called with nothing pending; callers must check `is_active` first
    #[error("No more pages to process")]
    Exhausted,

    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse checkpoint: {0}")]
    Deserialize(#[from] toml::de::Error),
}
