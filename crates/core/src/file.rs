//! The logical temporary file and its content sources.

use crate::key::FileKey;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A boxed reader over a file's content.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// Something that can produce the content of a temporary file on demand.
///
/// Each call to [`ContentSource::open`] must return a fresh reader positioned
/// at the first byte, so callers can restart a read from the beginning.
#[async_trait]
pub trait ContentSource: Send + Sync + 'static {
    /// Open a new reader over the content.
    async fn open(&self) -> io::Result<ContentReader>;
}

#[async_trait]
impl ContentSource for Bytes {
    async fn open(&self) -> io::Result<ContentReader> {
        Ok(Box::pin(io::Cursor::new(self.clone())))
    }
}

/// Content read from a file on the local filesystem.
#[derive(Clone, Debug)]
pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for PathSource {
    async fn open(&self) -> io::Result<ContentReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::pin(file))
    }
}

/// A temporary file as seen by callers.
///
/// It is never persisted as one object: the repository splits it into a
/// content object and a [`MetaDataFile`](crate::metadata::MetaDataFile) sidecar.
#[derive(Clone)]
pub struct TemporaryFile {
    /// Identity key, assigned by the caller before storing.
    pub key: FileKey,
    /// Display name of the original file.
    pub file_name: String,
    /// Instant after which the file is expired.
    pub available_until: OffsetDateTime,
    content: Arc<dyn ContentSource>,
}

impl TemporaryFile {
    /// Create a temporary file backed by any content source.
    pub fn new(
        key: FileKey,
        file_name: impl Into<String>,
        available_until: OffsetDateTime,
        content: impl ContentSource,
    ) -> Self {
        Self {
            key,
            file_name: file_name.into(),
            available_until,
            content: Arc::new(content),
        }
    }

    /// Create a temporary file whose content is held in memory.
    pub fn from_bytes(
        key: FileKey,
        file_name: impl Into<String>,
        available_until: OffsetDateTime,
        content: impl Into<Bytes>,
    ) -> Self {
        Self::new(key, file_name, available_until, content.into())
    }

    /// Open a fresh reader over the content. May be called any number of times.
    pub async fn open_read_stream(&self) -> io::Result<ContentReader> {
        self.content.open().await
    }

    /// Read the whole content into memory.
    pub async fn read_to_bytes(&self) -> io::Result<Bytes> {
        let mut reader = self.open_read_stream().await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Whether the file is strictly expired at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.available_until < now
    }
}

impl fmt::Debug for TemporaryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryFile")
            .field("key", &self.key)
            .field("file_name", &self.file_name)
            .field("available_until", &self.available_until)
            .finish_non_exhaustive()
    }
}
