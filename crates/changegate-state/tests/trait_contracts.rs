//! Trait contract tests for BlobStore.
//!
//! Every backend must pass the same behavioral checks: the in-memory fake,
//! the filesystem store, and SurrealDB running in `mem://` mode.

use changegate_state::fakes::MemoryBlobStore;
use changegate_state::{
    read_snapshot, write_snapshot, BlobStore, FsBlobStore, SnapshotKey, StorageError,
    SurrealBlobStore,
};

async fn check_missing_key_reads_none(store: &dyn BlobStore) {
    assert!(store.read(SnapshotKey::Users).await.unwrap().is_none());
}

async fn check_write_then_read(store: &dyn BlobStore) {
    let data = br#"{"hello":"world"}"#;
    store.write(SnapshotKey::ChangeRequests, data).await.unwrap();
    let got = store.read(SnapshotKey::ChangeRequests).await.unwrap();
    assert_eq!(got.as_deref(), Some(&data[..]));
}

async fn check_keys_are_independent(store: &dyn BlobStore) {
    store.write(SnapshotKey::Users, b"users").await.unwrap();
    store
        .write(SnapshotKey::Notifications, b"notifications")
        .await
        .unwrap();
    store.remove(SnapshotKey::Users).await.unwrap();

    assert!(store.read(SnapshotKey::Users).await.unwrap().is_none());
    assert_eq!(
        store
            .read(SnapshotKey::Notifications)
            .await
            .unwrap()
            .as_deref(),
        Some(&b"notifications"[..])
    );
}

async fn check_remove_missing_is_noop(store: &dyn BlobStore) {
    store.remove(SnapshotKey::Session).await.unwrap();
}

async fn check_typed_snapshot_round_trip(store: &dyn BlobStore) {
    let value = vec!["CR-1".to_string(), "CR-2".to_string()];
    write_snapshot(store, SnapshotKey::ChangeRequests, &value)
        .await
        .unwrap();
    let back: Option<Vec<String>> = read_snapshot(store, SnapshotKey::ChangeRequests)
        .await
        .unwrap();
    assert_eq!(back, Some(value));
}

async fn run_contract(store: &dyn BlobStore) {
    check_missing_key_reads_none(store).await;
    check_write_then_read(store).await;
    check_keys_are_independent(store).await;
    check_remove_missing_is_noop(store).await;
    check_typed_snapshot_round_trip(store).await;
}

#[tokio::test]
async fn memory_store_satisfies_contract() {
    let store = MemoryBlobStore::new();
    run_contract(&store).await;
}

#[tokio::test]
async fn fs_store_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path()).unwrap();
    run_contract(&store).await;
}

#[tokio::test]
async fn surreal_store_satisfies_contract() {
    let store = SurrealBlobStore::in_memory().await.unwrap();
    run_contract(&store).await;
}

#[tokio::test]
async fn fs_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FsBlobStore::new(dir.path()).unwrap();
        write_snapshot(&store, SnapshotKey::Users, &vec![1u32, 2, 3])
            .await
            .unwrap();
    }
    let reopened = FsBlobStore::new(dir.path()).unwrap();
    let back: Option<Vec<u32>> = read_snapshot(&reopened, SnapshotKey::Users).await.unwrap();
    assert_eq!(back, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn corrupt_blob_surfaces_as_corrupt_error() {
    let store = MemoryBlobStore::new();
    store.insert_raw(SnapshotKey::Users, "{{{ definitely not json");
    let err = read_snapshot::<Vec<String>>(&store, SnapshotKey::Users)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}

#[tokio::test]
async fn memory_store_counts_writes() {
    let store = MemoryBlobStore::new();
    store.write(SnapshotKey::Users, b"a").await.unwrap();
    store.write(SnapshotKey::Users, b"b").await.unwrap();
    assert_eq!(store.write_count(SnapshotKey::Users), 2);
    assert_eq!(store.write_count(SnapshotKey::Session), 0);
}
