use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempstash_core::METADATA_SUFFIX;
use tempstash_storage::{
    ListingCapabilities, ListingOptions, ListingResume, MemoryBackend, ObjectStore, PageStream,
    StorageError, StorageResult, StreamingUpload,
};

/// Memory-backed store with switchable failures.
///
/// Clones share the same backend and switches.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FaultyStore {
    pub inner: MemoryBackend,
    /// Content uploads (names without the metadata suffix) fail on write.
    pub fail_content_writes: Arc<AtomicBool>,
    /// Every `get` fails with a transient I/O error.
    pub fail_gets: Arc<AtomicBool>,
    /// Object names whose deletion fails.
    pub fail_deletes: Arc<Mutex<HashSet<String>>>,
    /// Deletes currently running and the highest value observed.
    pub deletes_in_flight: Arc<AtomicUsize>,
    pub max_deletes_in_flight: Arc<AtomicUsize>,
    /// Uploads aborted by the caller.
    pub aborted_uploads: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_delete_of(&self, name: impl Into<String>) {
        self.fail_deletes
            .lock()
            .expect("fault set poisoned")
            .insert(name.into());
    }

    pub fn max_concurrent_deletes(&self) -> usize {
        self.max_deletes_in_flight.load(Ordering::SeqCst)
    }
}

fn transient(what: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        format!("injected {what} failure"),
    ))
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn ensure_container(&self) -> StorageResult<()> {
        self.inner.ensure_container().await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(transient("get"));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.put(key, data).await
    }

    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let upload = self.inner.put_stream(key).await?;
        let fail = !key.ends_with(METADATA_SUFFIX) && self.fail_content_writes.load(Ordering::SeqCst);
        Ok(Box::new(FaultyUpload {
            inner: upload,
            fail,
            aborted: self.aborted_uploads.clone(),
        }))
    }

    async fn delete_if_exists(&self, key: &str) -> StorageResult<()> {
        let now = self.deletes_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_deletes_in_flight.fetch_max(now, Ordering::SeqCst);
        // Hold the slot long enough for concurrent deletes to overlap.
        tokio::time::sleep(Duration::from_millis(2)).await;

        let fail = self
            .fail_deletes
            .lock()
            .expect("fault set poisoned")
            .contains(key);
        let result = if fail {
            Err(transient("delete"))
        } else {
            self.inner.delete_if_exists(key).await
        };
        self.deletes_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn backend_name(&self) -> &'static str {
        "faulty-memory"
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
        self.inner.list_pages(prefix, options, resume)
    }
}

struct FaultyUpload {
    inner: Box<dyn StreamingUpload>,
    fail: bool,
    aborted: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamingUpload for FaultyUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.fail {
            return Err(transient("upload"));
        }
        self.inner.write(data).await
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        if self.fail {
            return Err(transient("upload"));
        }
        self.inner.finish().await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.aborted.fetch_add(1, Ordering::SeqCst);
        self.inner.abort().await
    }
}
