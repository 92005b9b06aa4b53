//! Storage trait definitions for changegate
//!
//! The persistence contract is deliberately small: a handful of independently
//! keyed blobs, each holding a full-collection snapshot. Backends only move
//! bytes; encoding and integrity checks live in [`crate::snapshot`].
//!
//! All traits are async and backend-agnostic. An in-memory fake is provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// SnapshotKey
// ---------------------------------------------------------------------------

/// The fixed set of persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKey {
    /// Registered users.
    Users,
    /// The change-request collection (newest first).
    ChangeRequests,
    /// In-app notifications (newest first).
    Notifications,
    /// The current-user pointer.
    Session,
}

impl SnapshotKey {
    /// Every key, in load order.
    pub const ALL: [SnapshotKey; 4] = [
        SnapshotKey::Users,
        SnapshotKey::ChangeRequests,
        SnapshotKey::Notifications,
        SnapshotKey::Session,
    ];

    /// Stable storage name for this key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "cms_users",
            Self::ChangeRequests => "cms_change_requests",
            Self::Notifications => "cms_notifications",
            Self::Session => "cms_session",
        }
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string) of a snapshot payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    ///
    /// Digests read back from storage are untrusted; a value that cannot be
    /// cut at byte 12 is returned whole.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// Keyed blob storage for collection snapshots.
///
/// Guarantees:
/// - `write(key, bytes)` replaces the whole blob for `key`.
/// - `read(key)` returns exactly the bytes last written, or `None`.
/// - Keys are independent; there is no cross-key transaction.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `key`, if any.
    async fn read(&self, key: SnapshotKey) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`.
    async fn write(&self, key: SnapshotKey, data: &[u8]) -> StorageResult<()>;

    /// Remove the blob stored under `key`. No-op if absent.
    async fn remove(&self, key: SnapshotKey) -> StorageResult<()>;
}
