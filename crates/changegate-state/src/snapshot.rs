//! Snapshot envelope codec.
//!
//! Every blob is a JSON document of the form
//! `{ "key": ..., "digest": <sha256 of payload>, "payload": ... }`.
//! A blob that fails to parse, carries the wrong key, or whose digest does
//! not match its payload is reported as [`StorageError::Corrupt`]; callers
//! decide how to recover.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{BlobStore, ContentDigest, SnapshotKey, StorageResult};

/// On-disk wrapper around a collection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    pub key: String,
    pub digest: ContentDigest,
    pub payload: serde_json::Value,
}

impl SnapshotEnvelope {
    /// Wrap a serializable value for `key`.
    pub fn seal<T: Serialize>(key: SnapshotKey, value: &T) -> StorageResult<Self> {
        let payload = serde_json::to_value(value)?;
        let digest = ContentDigest::from_bytes(&serde_json::to_vec(&payload)?);
        Ok(Self {
            key: key.as_str().to_string(),
            digest,
            payload,
        })
    }

    /// Verify key and digest, then decode the payload.
    pub fn open<T: DeserializeOwned>(self, key: SnapshotKey) -> StorageResult<T> {
        if self.key != key.as_str() {
            return Err(corrupt(
                key,
                format!("envelope belongs to '{}'", self.key),
            ));
        }
        let actual = ContentDigest::from_bytes(&serde_json::to_vec(&self.payload)?);
        if actual != self.digest {
            return Err(corrupt(
                key,
                format!(
                    "digest mismatch: expected {}, got {}",
                    self.digest.short(),
                    actual.short()
                ),
            ));
        }
        serde_json::from_value(self.payload).map_err(|e| corrupt(key, e.to_string()))
    }
}

fn corrupt(key: SnapshotKey, reason: String) -> StorageError {
    StorageError::Corrupt {
        key: key.as_str().to_string(),
        reason,
    }
}

/// Encode `value` as envelope bytes for `key`.
pub fn encode_snapshot<T: Serialize>(key: SnapshotKey, value: &T) -> StorageResult<Vec<u8>> {
    let envelope = SnapshotEnvelope::seal(key, value)?;
    Ok(serde_json::to_vec_pretty(&envelope)?)
}

/// Decode envelope bytes previously produced by [`encode_snapshot`].
pub fn decode_snapshot<T: DeserializeOwned>(key: SnapshotKey, data: &[u8]) -> StorageResult<T> {
    let envelope: SnapshotEnvelope =
        serde_json::from_slice(data).map_err(|e| corrupt(key, e.to_string()))?;
    envelope.open(key)
}

/// Read and decode the snapshot stored under `key`.
///
/// Returns `Ok(None)` when nothing has been written yet.
pub async fn read_snapshot<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: SnapshotKey,
) -> StorageResult<Option<T>> {
    match store.read(key).await? {
        Some(data) => decode_snapshot(key, &data).map(Some),
        None => Ok(None),
    }
}

/// Encode and write `value` under `key`, returning the payload digest.
pub async fn write_snapshot<T: Serialize + Sync>(
    store: &dyn BlobStore,
    key: SnapshotKey,
    value: &T,
) -> StorageResult<ContentDigest> {
    let envelope = SnapshotEnvelope::seal(key, value)?;
    let bytes = serde_json::to_vec_pretty(&envelope)?;
    store.write(key, &bytes).await?;
    debug!(key = %key, digest = %envelope.digest.short(), bytes = bytes.len(), "snapshot written");
    Ok(envelope.digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: String,
        count: u32,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                id: "a".into(),
                count: 1,
            },
            Row {
                id: "b".into(),
                count: 2,
            },
        ]
    }

    #[test]
    fn decode_returns_encoded_value() {
        let bytes = encode_snapshot(SnapshotKey::Users, &rows()).unwrap();
        let back: Vec<Row> = decode_snapshot(SnapshotKey::Users, &bytes).unwrap();
        assert_eq!(back, rows());
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = decode_snapshot::<Vec<Row>>(SnapshotKey::Users, b"{not json").unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn wrong_key_is_corrupt() {
        let bytes = encode_snapshot(SnapshotKey::Users, &rows()).unwrap();
        let err = decode_snapshot::<Vec<Row>>(SnapshotKey::Notifications, &bytes).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn tampered_payload_fails_digest_check() {
        let mut envelope = SnapshotEnvelope::seal(SnapshotKey::Users, &rows()).unwrap();
        envelope.payload[0]["count"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&envelope).unwrap();

        let err = decode_snapshot::<Vec<Row>>(SnapshotKey::Users, &bytes).unwrap_err();
        match err {
            StorageError::Corrupt { reason, .. } => assert!(reason.contains("digest mismatch")),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn payload_of_wrong_shape_is_corrupt() {
        let bytes = encode_snapshot(SnapshotKey::Users, &"just a string").unwrap();
        let err = decode_snapshot::<Vec<Row>>(SnapshotKey::Users, &bytes).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
