use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempstash_storage::error::StorageResult;
use tempstash_storage::traits::{
    ListingCapabilities, ListingOptions, ListingResume, ObjectStore, PageStream, StreamingUpload,
};

/// Wraps a store and counts how many listing pages callers actually pulled.
#[allow(dead_code)]
pub struct PageCountingStore<S> {
    pub inner: S,
    pub pages_fetched: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl<S: ObjectStore> PageCountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pages_fetched: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for PageCountingStore<S> {
    async fn ensure_container(&self) -> StorageResult<()> {
        self.inner.ensure_container().await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        self.inner.put_stream(key).await
    }

    async fn delete_if_exists(&self, key: &str) -> StorageResult<()> {
        self.inner.delete_if_exists(key).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    fn listing_capabilities(&self) -> ListingCapabilities {
        self.inner.listing_capabilities()
    }

    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a> {
        let counter = self.pages_fetched.clone();
        Box::pin(self.inner.list_pages(prefix, options, resume).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
