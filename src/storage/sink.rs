use crate::url::path_extension;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Name of the append-only URL index inside the dump directory
pub const INDEX_FILE: &str = "index.txt";

/// Returns the artifact file name for a URL
///
/// The name is the lowercase hex SHA-256 of the full URL, followed by the
/// extension of the URL's last path segment when it has a usable one.
///
/// # Examples
///
/// ```
/// use harvester::storage::file_name_for;
///
/// let name = file_name_for("https://shop.example/p/page.aspx");
/// assert_eq!(name.len(), 64 + ".html".len());
/// assert!(name.ends_with(".html"));
/// ```
pub fn file_name_for(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    match path_extension(url) {
        Some(ext) => format!("{}.{}", digest, ext),
        None => digest,
    }
}

/// Writes artifacts into a dump directory
///
/// One sink per dump directory per process. Artifact writes are
/// independent; index appends are serialized by an internal lock. A crash
/// between the two leaves a file without an index line.
#[derive(Debug)]
pub struct ArtifactSink {
    dir: PathBuf,
    index_lock: Mutex<()>,
}

impl ArtifactSink {
    /// Opens a sink, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            index_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Stores `bytes` fetched from `url` and records the URL in the index
    ///
    /// Storing the same URL again overwrites the file and appends a second
    /// index line.
    ///
    /// # Returns
    ///
    /// The path of the written artifact
    pub fn store(&self, bytes: &[u8], url: &str) -> io::Result<PathBuf> {
        let path = self.dir.join(file_name_for(url));
        fs::write(&path, bytes)?;

        // A poisoned lock only means another writer panicked mid-append
        let _guard = self
            .index_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut index = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.index_path())?;
        writeln!(index, "{}", url)?;

        tracing::debug!(url = %url, path = %path.display(), "Stored artifact");
        Ok(path)
    }

    /// URLs recorded in the index, in append order
    pub fn indexed_urls(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(self.index_path()) {
            Ok(content) => Ok(content.lines().map(String::from).collect()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
