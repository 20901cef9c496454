//! Durable store of already-published bon identities.
//!
//! The store is a newline-delimited UTF-8 file, append-only. An identity
//! is appended if and only if the remote API accepted the bill, and the
//! append is synced to disk before the next record is considered, so a
//! crash right after a success response cannot lose the marker.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// File-backed, append-only set of published bon identities.
#[derive(Debug, Clone)]
pub struct PublishedIds {
    path: PathBuf,
}

impl PublishedIds {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full identity set into memory.
    ///
    /// A missing file is an empty set (first run). Growth is linear in
    /// total lifetime volume, which is fine at the target throughput.
    pub fn load(&self) -> io::Result<HashSet<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e),
        };
        let ids: HashSet<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(count = ids.len(), path = %self.path.display(), "published_ids_loaded");
        Ok(ids)
    }

    /// Durably append one identity.
    pub fn append(&self, identity: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(identity.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        file.sync_all()?;
        debug!(identity = identity, "published_id_recorded");
        Ok(())
    }
}
