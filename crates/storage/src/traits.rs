//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of object keys for streaming list operations.
pub type KeyStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<String>> + Send + 'a>>;

/// A boxed stream of listing pages.
pub type PageStream<'a> = Pin<Box<dyn Stream<Item = StorageResult<ListingPage>> + Send + 'a>>;

// ===== Streaming Listing API Types =====

/// Page size constraints for listing operations.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MIN_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 10000;

/// Maximum size for continuation tokens (2 KB).
pub const MAX_TOKEN_SIZE: usize = 2048;

/// An opaque continuation token for resuming listing operations.
///
/// This token is backend-specific and should not be parsed or modified.
/// Maximum size is 2 KB.
#[derive(Clone, PartialEq, Eq)]
pub struct ContinuationToken(Vec<u8>);

impl ContinuationToken {
    /// Create a new continuation token from raw bytes.
    ///
    /// Returns an error if the token exceeds MAX_TOKEN_SIZE.
    pub fn new(data: Vec<u8>) -> StorageResult<Self> {
        if data.len() > MAX_TOKEN_SIZE {
            return Err(crate::error::StorageError::InvalidContinuationToken(
                format!(
                    "continuation token too large: {} bytes (max: {})",
                    data.len(),
                    MAX_TOKEN_SIZE
                ),
            ));
        }
        Ok(Self(data))
    }

    /// Get the raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to base64 for serialization.
    pub fn to_base64(&self) -> String {
        use base64::{Engine as _, engine::general_purpose};
        general_purpose::STANDARD.encode(&self.0)
    }

    /// Parse from base64.
    pub fn from_base64(s: &str) -> StorageResult<Self> {
        // Reject oversized input before decoding.
        const MAX_BASE64_INPUT: usize = MAX_TOKEN_SIZE * 2;
        if s.len() > MAX_BASE64_INPUT {
            return Err(crate::error::StorageError::InvalidContinuationToken(
                format!(
                    "continuation token base64 too large: {} bytes (max: {})",
                    s.len(),
                    MAX_BASE64_INPUT
                ),
            ));
        }

        use base64::{Engine as _, engine::general_purpose};
        let data = general_purpose::STANDARD.decode(s).map_err(|e| {
            crate::error::StorageError::InvalidContinuationToken(format!(
                "invalid continuation token base64: {}",
                e
            ))
        })?;
        Self::new(data)
    }
}

impl std::fmt::Debug for ContinuationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContinuationToken")
            .field(&"<redacted>")
            .finish()
    }
}

/// A single page of listing results.
#[derive(Clone, Debug)]
pub struct ListingPage {
    /// Object keys in this page.
    pub keys: Vec<String>,

    /// Continuation token for the next page, if there are more results.
    /// If None, this is the last page (or the backend is not resumable).
    pub next_token: Option<ContinuationToken>,
}

/// Backend capabilities for listing operations.
#[derive(Clone, Debug)]
pub struct ListingCapabilities {
    /// Whether the backend supports resumable listings with continuation tokens.
    pub resumable: bool,
}

/// Options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingOptions {
    /// Number of keys to fetch per page.
    ///
    /// This value will be clamped to [MIN_PAGE_SIZE, MAX_PAGE_SIZE].
    pub page_size: usize,
}

impl ListingOptions {
    /// Create new listing options with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Get the normalized page size.
    pub fn normalized_page_size(&self) -> usize {
        self.page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
    }
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Resume options for listing operations.
#[derive(Clone, Debug)]
pub struct ListingResume {
    /// Continuation token from a previous listing operation.
    ///
    /// The backend must validate that the token is compatible with the current
    /// listing request (same prefix, options, backend identity).
    pub start_token: ContinuationToken,
}

impl ListingResume {
    /// Create new resume options with the given token.
    pub fn new(start_token: ContinuationToken) -> Self {
        Self { start_token }
    }
}

/// Object store abstraction scoped to a single container.
///
/// Keys are object names inside the container. Every call may fail
/// transiently; implementations never retry on their own.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Create the container if it does not exist yet. Idempotent.
    async fn ensure_container(&self) -> StorageResult<()>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content. Returns `StorageError::NotFound` if absent.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object, overwriting any existing object with the same key.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Start a streaming upload. The object becomes visible on `finish`.
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>>;

    /// Delete an object. A missing object is not an error.
    async fn delete_if_exists(&self, key: &str) -> StorageResult<()>;

    /// Get the name of this storage backend (e.g., "s3", "filesystem").
    ///
    /// Used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Get the listing capabilities of this backend.
    fn listing_capabilities(&self) -> ListingCapabilities;

    /// List objects with a prefix, returning a stream of pages.
    ///
    /// Each page contains a batch of object keys and an optional continuation token
    /// for fetching the next page. Pages are fetched on demand, so the full listing
    /// is never materialized in memory.
    ///
    /// # Errors
    ///
    /// The stream yields an error if:
    /// - The backend does not support resumption but a start_token was provided
    /// - The continuation token is invalid or does not match this listing
    /// - There is a backend-specific error fetching the listing
    fn list_pages<'a>(
        &'a self,
        prefix: &str,
        options: ListingOptions,
        resume: Option<ListingResume>,
    ) -> PageStream<'a>;
}

/// Trait for streaming uploads.
#[async_trait]
pub trait StreamingUpload: Send {
    /// Write a chunk of data.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Finish the upload and return the total bytes written.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Abort the upload.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

/// Extension trait providing flat key streams on top of `list_pages()`.
///
/// Automatically implemented for every `ObjectStore`; do not implement it manually.
pub trait ObjectStoreListStreamExt: ObjectStore {
    /// List objects with a prefix, returning a flat stream of keys.
    ///
    /// Keys are yielded in the order they appear in the backend's listing
    /// (which may not be lexicographic).
    fn list_stream_ext<'a>(&'a self, prefix: &str, options: Option<ListingOptions>) -> KeyStream<'a> {
        let options = options.unwrap_or_default();
        let page_stream = self.list_pages(prefix, options, None);

        let key_stream = page_stream.flat_map(|page_result| match page_result {
            Ok(page) => futures::stream::iter(page.keys.into_iter().map(Ok)).boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        });

        Box::pin(key_stream)
    }

    /// List every object in the container whose key ends with `suffix`.
    ///
    /// Filtering happens client-side as pages arrive.
    fn list_suffix_stream<'a>(
        &'a self,
        suffix: &str,
        options: Option<ListingOptions>,
    ) -> KeyStream<'a> {
        let suffix = suffix.to_string();
        let keys = self.list_stream_ext("", options).filter(move |item| {
            let keep = match item {
                Ok(key) => key.ends_with(&suffix),
                Err(_) => true,
            };
            futures::future::ready(keep)
        });

        Box::pin(keys)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStoreListStreamExt for T {}
