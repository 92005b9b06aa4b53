//! SurrealDB-backed blob store
//!
//! Each snapshot key maps to one record in the `snapshots` table:
//! `snapshots:<key> { key, payload, size_bytes, updated_at }`.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StorageError;
use crate::storage_traits::{BlobStore, SnapshotKey, StorageResult};

const NAMESPACE: &str = "changegate";
const DATABASE: &str = "main";

/// SurrealDB-backed implementation of [`BlobStore`].
#[derive(Clone)]
pub struct SurrealBlobStore {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    payload: String,
}

impl SurrealBlobStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`, `ws://host`).
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { db };
        store.init_schema().await?;
        info!("SurrealBlobStore connected");
        Ok(store)
    }

    /// Connect using `SURREALDB_URL`, if set.
    pub async fn from_env() -> Option<StorageResult<Self>> {
        let url = std::env::var("SURREALDB_URL").ok()?;
        Some(Self::connect(&url).await)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let schema = r#"
            DEFINE TABLE IF NOT EXISTS snapshots SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS key ON snapshots TYPE string;
            DEFINE FIELD IF NOT EXISTS payload ON snapshots TYPE string;
            DEFINE FIELD IF NOT EXISTS size_bytes ON snapshots TYPE int;
            DEFINE FIELD IF NOT EXISTS updated_at ON snapshots TYPE datetime;
        "#;
        self.db
            .query(schema)
            .await
            .map_err(|e| StorageError::Connection(format!("Schema setup failed: {e}")))?
            .check()?;
        debug!("snapshot schema initialized");
        Ok(())
    }
}

#[async_trait]
impl BlobStore for SurrealBlobStore {
    async fn read(&self, key: SnapshotKey) -> StorageResult<Option<Vec<u8>>> {
        let mut res = self
            .db
            .query("SELECT payload FROM type::thing('snapshots', $key)")
            .bind(("key", key.as_str().to_string()))
            .await?;
        let rows: Vec<SnapshotRow> = res.take(0)?;
        Ok(rows.into_iter().next().map(|r| r.payload.into_bytes()))
    }

    async fn write(&self, key: SnapshotKey, data: &[u8]) -> StorageResult<()> {
        let payload = String::from_utf8(data.to_vec())
            .map_err(|e| StorageError::Serialization(format!("snapshot is not UTF-8: {e}")))?;
        let size = payload.len() as i64;
        self.db
            .query(
                "UPSERT type::thing('snapshots', $key) CONTENT { \
                    key: $key, payload: $payload, size_bytes: $size, updated_at: time::now() \
                 }",
            )
            .bind(("key", key.as_str().to_string()))
            .bind(("payload", payload))
            .bind(("size", size))
            .await?
            .check()?;
        Ok(())
    }

    async fn remove(&self, key: SnapshotKey) -> StorageResult<()> {
        self.db
            .query("DELETE type::thing('snapshots', $key)")
            .bind(("key", key.as_str().to_string()))
            .await?
            .check()?;
        Ok(())
    }
}
