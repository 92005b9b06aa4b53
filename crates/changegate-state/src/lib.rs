//! changegate-state: snapshot persistence for changegate
//!
//! This crate provides the persistence layer for the change-request tracker.
//! State is stored as a few independently keyed, whole-collection snapshots.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: byte-exact round-trips and corruption detection. No cross-key
//! transactions.
//!
//! ## Key Components
//!
//! - `BlobStore`: the backend trait (read / write / remove by `SnapshotKey`)
//! - `SnapshotEnvelope`: digest-checked JSON wrapper around each collection
//! - `FsBlobStore`, `SurrealBlobStore`: durable backends
//! - `fakes::MemoryBlobStore`: in-memory backend for tests

mod error;
pub mod fakes;
mod fs;
pub mod snapshot;
pub mod storage_traits;
mod surreal;

pub use error::StorageError;
pub use fs::FsBlobStore;
pub use snapshot::{
    decode_snapshot, encode_snapshot, read_snapshot, write_snapshot, SnapshotEnvelope,
};
pub use storage_traits::{BlobStore, ContentDigest, SnapshotKey, StorageResult};
pub use surreal::SurrealBlobStore;
