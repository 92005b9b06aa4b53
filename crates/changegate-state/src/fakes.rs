//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryBlobStore`, which satisfies the `BlobStore` contract
//! without touching the filesystem or a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory blob store backed by a `HashMap<key, bytes>`.
///
/// Also counts writes per key so tests can assert on persistence traffic.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<SnapshotKey, Vec<u8>>>,
    writes: Mutex<HashMap<SnapshotKey, usize>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls observed for `key`.
    pub fn write_count(&self, key: SnapshotKey) -> usize {
        self.writes
            .lock()
            .map(|w| w.get(&key).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Plant raw bytes under `key`, bypassing the envelope codec.
    pub fn insert_raw(&self, key: SnapshotKey, data: impl Into<Vec<u8>>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(key, data.into());
        }
    }
}

fn poisoned() -> StorageError {
    StorageError::Backend("memory store lock poisoned".to_string())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: SnapshotKey) -> StorageResult<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().map_err(|_| poisoned())?;
        Ok(blobs.get(&key).cloned())
    }

    async fn write(&self, key: SnapshotKey, data: &[u8]) -> StorageResult<()> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.insert(key, data.to_vec());
        let mut writes = self.writes.lock().map_err(|_| poisoned())?;
        *writes.entry(key).or_default() += 1;
        Ok(())
    }

    async fn remove(&self, key: SnapshotKey) -> StorageResult<()> {
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.remove(&key);
        Ok(())
    }
}
