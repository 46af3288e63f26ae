// Behaviour every local backend must share, run against memory and filesystem.

mod common;

use bytes::Bytes;
use common::{populate, seeded_bytes};
use futures::StreamExt;
use std::collections::HashSet;
use tempfile::TempDir;
use tempstash_storage::error::StorageError;
use tempstash_storage::traits::{ListingOptions, ObjectStore, ObjectStoreListStreamExt};
use tempstash_storage::{FilesystemBackend, MemoryBackend};

async fn filesystem() -> (TempDir, FilesystemBackend) {
    let dir = TempDir::new().unwrap();
    let backend = FilesystemBackend::new(dir.path().join("tempfiles"))
        .await
        .unwrap();
    (dir, backend)
}

async fn check_object_lifecycle(store: &dyn ObjectStore) {
    store.ensure_container().await.unwrap();
    store.ensure_container().await.unwrap();

    let data = seeded_bytes(7, 10_000);
    store.put("a", data.clone()).await.unwrap();
    assert!(store.exists("a").await.unwrap());
    assert_eq!(store.get("a").await.unwrap(), data);

    store.put("a", Bytes::from_static(b"replaced")).await.unwrap();
    assert_eq!(store.get("a").await.unwrap(), Bytes::from_static(b"replaced"));

    store.delete_if_exists("a").await.unwrap();
    store.delete_if_exists("a").await.unwrap();
    assert!(!store.exists("a").await.unwrap());
    assert!(matches!(
        store.get("a").await,
        Err(StorageError::NotFound(_))
    ));
}

async fn check_streaming_upload(store: &dyn ObjectStore) {
    let data = seeded_bytes(11, 200 * 1024);
    let mut upload = store.put_stream("streamed").await.unwrap();
    for chunk in data.chunks(64 * 1024) {
        upload.write(Bytes::copy_from_slice(chunk)).await.unwrap();
    }
    assert!(!store.exists("streamed").await.unwrap());
    assert_eq!(upload.finish().await.unwrap(), data.len() as u64);
    assert_eq!(store.get("streamed").await.unwrap(), data);

    let mut aborted = store.put_stream("aborted").await.unwrap();
    aborted.write(Bytes::from_static(b"partial")).await.unwrap();
    aborted.abort().await.unwrap();
    assert!(!store.exists("aborted").await.unwrap());
}

async fn check_suffix_listing(store: &dyn ObjectStore) {
    let mut expected = HashSet::new();
    for i in 0..120 {
        let base = format!("{i:08x}");
        store.put(&base, Bytes::from_static(b"c")).await.unwrap();
        let meta = format!("{base}.metadata");
        store.put(&meta, Bytes::from_static(b"{}")).await.unwrap();
        expected.insert(meta);
    }

    let listed: Vec<String> = store
        .list_suffix_stream(".metadata", Some(ListingOptions::new(100)))
        .map(|k| k.unwrap())
        .collect()
        .await;

    assert_eq!(listed.len(), expected.len(), "no duplicates across pages");
    assert_eq!(listed.into_iter().collect::<HashSet<_>>(), expected);
}

async fn check_full_listing(store: &dyn ObjectStore) {
    let names: HashSet<String> = populate(store, "f", 1_050).await.into_iter().collect();

    let mut seen = HashSet::new();
    let mut pages = store.list_pages("", ListingOptions::new(100), None);
    while let Some(page) = pages.next().await {
        let page = page.unwrap();
        assert!(page.keys.len() <= 100);
        for key in page.keys {
            assert!(seen.insert(key), "key listed twice");
        }
    }
    assert_eq!(seen, names);
}

#[tokio::test]
async fn memory_object_lifecycle() {
    check_object_lifecycle(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn filesystem_object_lifecycle() {
    let (_dir, backend) = filesystem().await;
    check_object_lifecycle(&backend).await;
}

#[tokio::test]
async fn memory_streaming_upload() {
    check_streaming_upload(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn filesystem_streaming_upload() {
    let (_dir, backend) = filesystem().await;
    check_streaming_upload(&backend).await;
}

#[tokio::test]
async fn memory_suffix_listing() {
    check_suffix_listing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn filesystem_suffix_listing() {
    let (_dir, backend) = filesystem().await;
    check_suffix_listing(&backend).await;
}

#[tokio::test]
async fn memory_full_listing() {
    check_full_listing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn filesystem_full_listing() {
    let (_dir, backend) = filesystem().await;
    check_full_listing(&backend).await;
}

#[tokio::test]
async fn filesystem_listing_of_missing_container_is_empty() {
    let (dir, backend) = filesystem().await;
    std::fs::remove_dir_all(dir.path().join("tempfiles")).unwrap();

    let pages: Vec<_> = backend
        .list_pages("", ListingOptions::default(), None)
        .collect()
        .await;
    assert!(pages.iter().all(|p| p.is_ok()));
    assert!(pages.iter().map(|p| p.as_ref().unwrap().keys.len()).sum::<usize>() == 0);
}
