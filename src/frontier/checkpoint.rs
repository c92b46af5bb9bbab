use crate::frontier::{Frontier, FrontierError, FrontierStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Persisted frontier record
///
/// Stored as TOML:
///
/// ```toml
/// processed-count = 12
/// saved-at = "2024-05-01T10:00:00Z"
/// added = ["https://shop.example/a", "https://shop.example/sitemap.xml"]
/// in-flight = []
/// queues = [["https://shop.example/b"], []]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontierState {
    #[serde(rename = "processed-count", default)]
    pub processed_count: u64,

    #[serde(rename = "saved-at", default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,

    /// Every URL ever added (the dedup set)
    #[serde(default)]
    pub added: Vec<String>,

    /// URLs popped whose handler had not completed when the record was written
    #[serde(rename = "in-flight", default)]
    pub in_flight: Vec<String>,

    /// Pending URLs per priority class, in FIFO order
    #[serde(default)]
    pub queues: Vec<Vec<String>>,
}

impl FrontierState {
    /// Reads a checkpoint file; a missing file yields `Ok(None)`
    pub fn load(path: &Path) -> Result<Option<Self>, FrontierError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&content)?))
    }

    /// Writes the checkpoint next to its destination, then renames it into place
    ///
    /// A reader never sees a half-written checkpoint: it finds either the
    /// previous file or the new one.
    pub fn save(&self, path: &Path) -> Result<(), FrontierError> {
        let content = toml::to_string(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Total pending URLs across all classes
    pub fn pending(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "checkpoint".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Owns a frontier for the duration of a crawl
///
/// Opening restores the checkpoint (if any). The checkpoint is written exactly
/// once: by [`CheckpointGuard::close`] on the normal and interrupt paths, or by
/// `Drop` when the guard is dropped without being closed (error propagation,
/// panics unwinding through the crawl).
#[derive(Debug)]
pub struct CheckpointGuard {
    frontier: Frontier,
    path: Option<PathBuf>,
    closed: bool,
}

impl CheckpointGuard {
    /// Takes ownership of `frontier`, restoring it from `path` when the file exists
    ///
    /// With `path = None` the crawl is not persisted at all.
    pub fn open(mut frontier: Frontier, path: Option<PathBuf>) -> Result<Self, FrontierError> {
        if let Some(path) = &path {
            if frontier.restore(path)? {
                let stats = frontier.stats();
                tracing::info!(
                    "Restored frontier from {}: {} pending, {} seen, {} processed",
                    path.display(),
                    stats.pending(),
                    stats.added,
                    stats.processed
                );
            } else {
                tracing::info!("No checkpoint at {}, starting cold", path.display());
            }
        }

        Ok(Self {
            frontier,
            path,
            closed: false,
        })
    }

    /// Checkpoints the frontier and consumes the guard
    pub fn close(mut self) -> Result<FrontierStats, FrontierError> {
        self.closed = true;
        let stats = self.frontier.stats();
        if let Some(path) = &self.path {
            self.frontier.checkpoint(path)?;
            tracing::info!(
                "Checkpoint written to {} ({} pending, {} in flight)",
                path.display(),
                stats.pending(),
                stats.in_flight
            );
        }
        Ok(stats)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Deref for CheckpointGuard {
    type Target = Frontier;

    fn deref(&self) -> &Frontier {
        &self.frontier
    }
}

impl DerefMut for CheckpointGuard {
    fn deref_mut(&mut self) -> &mut Frontier {
        &mut self.frontier
    }
}

impl Drop for CheckpointGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(path) = &self.path {
            match self.frontier.checkpoint(path) {
                Ok(()) => tracing::warn!(
                    "Crawl ended abnormally; checkpoint written to {}",
                    path.display()
                ),
                Err(e) => tracing::error!("Failed to write checkpoint {}: {}", path.display(), e),
            }
        }
    }
}
