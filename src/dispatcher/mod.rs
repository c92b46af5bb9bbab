//! Dispatcher module: flat task lists with bounded retries
//!
//! This module provides:
//! - `Dispatcher`: runs a closure over a list of objects on a bounded pool,
//!   re-queueing failures with exponential backoff
//! - `DispatchState`: the persisted list of pending tasks and their attempts

mod runner;
mod state;

pub use runner::{DispatchReport, DispatchSettings, Dispatcher};
pub use state::{DispatchState, DispatchTask};

use thiserror::Error;

/// Errors raised while loading or saving dispatcher state
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatcher state IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize dispatcher state: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to parse dispatcher state: {0}")]
    Deserialize(#[from] toml::de::Error),
}
