//! Check-then-materialize artifact store
//!
//! Every durable output goes through this primitive: `exists` is the
//! completion marker check and `materialize` publishes atomically
//! (write-to-temp-then-rename), so a concurrent reader never observes a
//! half-written artifact and an interrupted run leaves nothing behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Filesystem-backed artifact store rooted at the data directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a storage key
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Completion marker check; absence means "not yet attempted or the
    /// attempt failed", never "corrupt"
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(key))?)
    }

    pub fn read_to_string(&self, key: &str) -> Result<String> {
        Ok(fs::read_to_string(self.path(key))?)
    }

    /// Atomically publish a single-file artifact
    pub fn materialize(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dest = self.path(key);
        let parent = dest.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(bytes)?;
        tmp.persist(&dest).map_err(|e| Error::Io(e.error))?;
        Ok(dest)
    }

    /// Atomically publish a directory artifact
    ///
    /// Files are staged into a temp directory next to the destination and
    /// the directory is renamed into place, so the destination either does
    /// not exist or is complete.
    pub fn publish_dir(&self, key: &str, files: &[(&str, &[u8])]) -> Result<PathBuf> {
        let dest = self.path(key);
        let parent = dest.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(parent)?;
        for (name, bytes) in files {
            fs::write(staging.path().join(name), bytes)?;
        }
        // Staged path outlives the TempDir guard only once the rename
        // succeeded; a failed rename removes the staging directory.
        let staged = staging.into_path();
        if let Err(e) = fs::rename(&staged, &dest) {
            let _ = fs::remove_dir_all(&staged);
            return Err(e.into());
        }
        Ok(dest)
    }
}
