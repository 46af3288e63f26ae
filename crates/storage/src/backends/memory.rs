//! In-process storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{
    ContinuationToken, ListingCapabilities, ListingOptions, ListingPage, ListingResume,
    ObjectStore, PageStream, StreamingUpload,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::instrument;

type Objects = Arc<RwLock<BTreeMap<String, Bytes>>>;

/// Object store held in memory.
///
/// Keys are kept in lexicographic order, so listings are resumable by
/// position: the continuation token is the last key of the previous page.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    objects: Objects,
    container_created: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ensure_container` has been called at least once.
    pub fn container_created(&self) -> bool {
        self.container_created.load(Ordering::SeqCst)
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Snapshot of every stored key, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn ensure_container(&self) -> StorageResult<()> {
        self.container_created.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.objects.read().await.contains_key(key))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    #[instrument(skip(self, data), fields(backend = "memory", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.insert(key.to_string(), data);
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        validate_key(key)?;
        Ok(Box::new(MemoryUpload {
            objects: self.objects.clone(),
            key: key.to_string(),
            buffer: Vec::new(),
        }))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn delete_if_exists(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn listing_capabilities(&self) -> ListingCapabilities {
        ListingCapabilities { resumable: true }
    }

    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a> {
        let prefix = prefix.to_string();
        let page_size = options.normalized_page_size();

        let start_after = match resume {
            Some(resume) => match String::from_utf8(resume.start_token.as_bytes().to_vec()) {
                Ok(last) if last.starts_with(&prefix) => Some(last),
                Ok(_) => {
                    let err = StorageError::InvalidContinuationToken(
                        "token does not belong to this prefix".to_string(),
                    );
                    return Box::pin(futures::stream::once(async move { Err(err) }));
                }
                Err(e) => {
                    let err = StorageError::InvalidContinuationToken(format!(
                        "invalid memory continuation token: {e}"
                    ));
                    return Box::pin(futures::stream::once(async move { Err(err) }));
                }
            },
            None => None,
        };

        let objects = self.objects.clone();
        let stream = async_stream::try_stream! {
            let mut cursor = start_after;
            loop {
                // Each page takes its own snapshot, so writes between pages are
                // visible to later pages.
                let (keys, has_more) = {
                    let guard = objects.read().await;
                    let lower = match &cursor {
                        Some(last) => Bound::Excluded(last.clone()),
                        None => Bound::Included(prefix.clone()),
                    };
                    let mut matching = guard
                        .range::<String, _>((lower, Bound::Unbounded))
                        .map(|(key, _)| key)
                        .take_while(|key| key.starts_with(&prefix));
                    let keys: Vec<String> = matching.by_ref().take(page_size).cloned().collect();
                    let has_more = matching.next().is_some();
                    (keys, has_more)
                };

                if keys.is_empty() {
                    break;
                }

                let next_token = match (has_more, keys.last()) {
                    (true, Some(last)) => Some(ContinuationToken::new(last.as_bytes().to_vec())?),
                    _ => None,
                };
                cursor = keys.last().cloned();

                yield ListingPage { keys, next_token };

                if !has_more {
                    break;
                }
            }
        };

        Box::pin(stream)
    }
}

/// Streaming upload for the memory backend. Buffered until `finish`.
struct MemoryUpload {
    objects: Objects,
    key: String,
    buffer: Vec<u8>,
}

#[async_trait]
impl StreamingUpload for MemoryUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.buffer.extend_from_slice(&data);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        let len = self.buffer.len() as u64;
        self.objects
            .write()
            .await
            .insert(self.key, Bytes::from(self.buffer));
        Ok(len)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let backend = MemoryBackend::new();
        backend.put("a", Bytes::from("hello")).await.unwrap();
        assert!(backend.exists("a").await.unwrap());
        assert_eq!(backend.get("a").await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.get("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_if_exists_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.put("a", Bytes::from("x")).await.unwrap();
        backend.delete_if_exists("a").await.unwrap();
        backend.delete_if_exists("a").await.unwrap();
        assert!(!backend.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_streaming_upload_visible_after_finish() {
        let backend = MemoryBackend::new();
        let mut upload = backend.put_stream("s").await.unwrap();
        upload.write(Bytes::from("he")).await.unwrap();
        upload.write(Bytes::from("llo")).await.unwrap();
        assert!(!backend.exists("s").await.unwrap());
        assert_eq!(upload.finish().await.unwrap(), 5);
        assert_eq!(backend.get("s").await.unwrap(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_aborted_upload_leaves_nothing() {
        let backend = MemoryBackend::new();
        let mut upload = backend.put_stream("s").await.unwrap();
        upload.write(Bytes::from("partial")).await.unwrap();
        upload.abort().await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_pages_resumes_by_position() {
        let backend = MemoryBackend::new();
        for i in 0..250 {
            backend
                .put(&format!("item/{i:04}"), Bytes::from_static(b"x"))
                .await
                .unwrap();
        }
        backend.put("other/0", Bytes::from_static(b"x")).await.unwrap();

        let mut pages = backend.list_pages("item/", ListingOptions::new(100), None);
        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first.keys.len(), 100);
        assert_eq!(first.keys[0], "item/0000");
        let token = first.next_token.expect("more pages remain");
        drop(pages);

        let resumed: Vec<String> = backend
            .list_pages("item/", ListingOptions::new(100), Some(ListingResume::new(token)))
            .map(|page| page.unwrap().keys)
            .concat()
            .await;
        assert_eq!(resumed.len(), 150);
        assert_eq!(resumed[0], "item/0100");
        assert!(resumed.iter().all(|k| k.starts_with("item/")));
    }

    #[tokio::test]
    async fn test_last_page_has_no_token() {
        let backend = MemoryBackend::new();
        for i in 0..100 {
            backend.put(&format!("k{i:03}"), Bytes::new()).await.unwrap();
        }
        let pages: Vec<ListingPage> = backend
            .list_pages("", ListingOptions::new(100), None)
            .map(|p| p.unwrap())
            .collect()
            .await;
        assert_eq!(pages.len(), 1);
        assert!(pages[0].next_token.is_none());
    }

    #[tokio::test]
    async fn test_list_pages_rejects_foreign_token() {
        let backend = MemoryBackend::new();
        let token = ContinuationToken::new(b"elsewhere/1".to_vec()).unwrap();
        let mut pages =
            backend.list_pages("item/", ListingOptions::default(), Some(ListingResume::new(token)));
        assert!(matches!(
            pages.next().await,
            Some(Err(StorageError::InvalidContinuationToken(_)))
        ));
    }
}
