//! Filesystem-backed blob store.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::storage_traits::{BlobStore, SnapshotKey, StorageResult};

/// One JSON file per snapshot key.
///
/// Layout: `<root>/<key>.json`
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a new `FsBlobStore` rooted at `root`. Creates `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the snapshot files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: SnapshotKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_str()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, key: SnapshotKey) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.blob_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: SnapshotKey, data: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(key);

        // Atomic write: write to temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!(path = %path.display(), bytes = data.len(), "blob persisted");
        Ok(())
    }

    async fn remove(&self, key: SnapshotKey) -> StorageResult<()> {
        match fs::remove_file(self.blob_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
