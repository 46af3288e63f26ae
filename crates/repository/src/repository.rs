//! Store, fetch and delete for temporary files.

use crate::error::{RepositoryError, Result};
use crate::metrics;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tempstash_core::config::{SweepConfig, TemporaryFileSettings};
use tempstash_core::metadata::{self, MetaDataFile};
use tempstash_core::naming::{content_name, metadata_name};
use tempstash_core::{FileKey, TemporaryFile};
use tempstash_storage::{ObjectStore, StorageError, StorageResult, StreamingUpload};
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// Read size used when streaming content into the object store (64 KiB).
pub const CONTENT_CHUNK_SIZE: usize = 64 * 1024;

/// Persists temporary files as a content object plus a `.metadata` sidecar,
/// both inside a single container.
///
/// A file is visible only when both objects exist and the sidecar decodes.
/// Writes always put the sidecar first, so an interrupted store leaves a
/// partial entity that `fetch` reports as absent.
#[derive(Clone)]
pub struct TemporaryFileRepository {
    store: Arc<dyn ObjectStore>,
    sweep_defaults: SweepConfig,
}

impl std::fmt::Debug for TemporaryFileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryFileRepository")
            .field("backend", &self.store.backend_name())
            .field("sweep_defaults", &self.sweep_defaults)
            .finish()
    }
}

impl TemporaryFileRepository {
    /// Create a repository over a store already scoped to its container.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            sweep_defaults: SweepConfig::default(),
        }
    }

    /// Replace the options used by [`sweep`](Self::sweep).
    pub fn with_sweep_defaults(mut self, sweep: SweepConfig) -> Self {
        self.sweep_defaults = sweep;
        self
    }

    /// Build the backend described by `settings` and wrap it.
    pub async fn from_settings(settings: &TemporaryFileSettings) -> Result<Self> {
        settings
            .validate()
            .map_err(|e| RepositoryError::Config(e.to_string()))?;
        let store = tempstash_storage::from_config(&settings.storage, &settings.container_name)
            .await
            .map_err(|e| match e {
                StorageError::Config(msg) => RepositoryError::Config(msg),
                other => RepositoryError::Config(format!("failed to open object store: {other}")),
            })?;

        tracing::info!(
            backend = store.backend_name(),
            container = %settings.container_name,
            "Temporary file repository configured"
        );

        Ok(Self::new(store).with_sweep_defaults(settings.sweep.clone()))
    }

    /// The underlying object store.
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub(crate) fn sweep_defaults(&self) -> &SweepConfig {
        &self.sweep_defaults
    }

    /// Persist `file`, overwriting any existing file with the same key.
    ///
    /// The sidecar is written before the content. A failure after the sidecar
    /// upload leaves a partial entity behind; nothing is rolled back.
    #[instrument(skip(self, file), fields(key = %file.key, backend = self.store.backend_name()))]
    pub async fn store(&self, file: &TemporaryFile) -> Result<()> {
        let key = file.key;

        self.store
            .ensure_container()
            .await
            .map_err(|source| RepositoryError::Store { key, source })?;

        let encoded = metadata::encode(&MetaDataFile::from(file))?;
        self.store
            .put(&metadata_name(&key), encoded)
            .await
            .map_err(|source| RepositoryError::Store { key, source })?;

        let bytes = self.upload_content(file).await?;

        metrics::FILES_STORED.inc();
        tracing::debug!(bytes, "Stored temporary file");
        Ok(())
    }

    async fn upload_content(&self, file: &TemporaryFile) -> Result<u64> {
        let key = file.key;
        let reader = file
            .open_read_stream()
            .await
            .map_err(|source| RepositoryError::Content { key, source })?;
        let upload = self
            .store
            .put_stream(&content_name(&key))
            .await
            .map_err(|source| RepositoryError::Store { key, source })?;
        let mut upload = UploadGuard::new(upload, key);

        let mut chunks = ReaderStream::with_capacity(reader, CONTENT_CHUNK_SIZE);
        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    upload.abort().await;
                    return Err(RepositoryError::Content { key, source });
                }
            };
            if let Err(source) = upload.write(chunk).await {
                upload.abort().await;
                return Err(RepositoryError::Store { key, source });
            }
        }

        upload
            .finish()
            .await
            .map_err(|source| RepositoryError::Store { key, source })
    }

    /// Look up a file by key.
    ///
    /// Returns `Ok(None)` when the sidecar is missing or undecodable, or when
    /// the content object is missing. Content is downloaded in full; the
    /// returned file can be read any number of times.
    #[instrument(skip(self), fields(key = %key, backend = self.store.backend_name()))]
    pub async fn fetch(&self, key: FileKey) -> Result<Option<TemporaryFile>> {
        let raw = match self.store.get(&metadata_name(&key)).await {
            Ok(raw) => raw,
            Err(StorageError::NotFound(_)) => {
                metrics::FETCH_MISSES.inc();
                return Ok(None);
            }
            Err(source) => return Err(RepositoryError::Fetch { key, source }),
        };

        let record = match metadata::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable metadata, treating file as absent");
                metrics::FETCH_MISSES.inc();
                return Ok(None);
            }
        };
        if record.key != key {
            tracing::warn!(
                recorded_key = %record.key,
                "Metadata records a different key than its object name"
            );
        }

        let content = match self.store.get(&content_name(&key)).await {
            Ok(content) => content,
            Err(StorageError::NotFound(_)) => {
                tracing::debug!("Metadata present without content, treating file as absent");
                metrics::FETCH_MISSES.inc();
                return Ok(None);
            }
            Err(source) => return Err(RepositoryError::Fetch { key, source }),
        };

        metrics::FETCH_HITS.inc();
        Ok(Some(TemporaryFile::from_bytes(
            key,
            record.file_name,
            record.available_until,
            content,
        )))
    }

    /// Remove both objects for `key`. Missing objects are not an error.
    #[instrument(skip(self), fields(key = %key, backend = self.store.backend_name()))]
    pub async fn delete(&self, key: FileKey) -> Result<()> {
        self.delete_objects(key).await?;
        metrics::FILES_DELETED.inc();
        tracing::debug!("Deleted temporary file");
        Ok(())
    }

    /// Content first, then the sidecar, so an interrupted delete never leaves
    /// content without metadata.
    pub(crate) async fn delete_objects(&self, key: FileKey) -> Result<()> {
        self.store
            .delete_if_exists(&content_name(&key))
            .await
            .map_err(|source| RepositoryError::Delete { key, source })?;
        self.store
            .delete_if_exists(&metadata_name(&key))
            .await
            .map_err(|source| RepositoryError::Delete { key, source })?;
        Ok(())
    }
}

/// Aborts a content upload that is dropped before `finish` or `abort`, such
/// as when the `store` future is cancelled mid-transfer.
///
/// The abort runs on a task spawned onto the runtime that created the guard.
/// Without a runtime the upload is only logged.
struct UploadGuard {
    upload: Option<Box<dyn StreamingUpload>>,
    key: FileKey,
    runtime_handle: Option<tokio::runtime::Handle>,
}

impl UploadGuard {
    fn new(upload: Box<dyn StreamingUpload>, key: FileKey) -> Self {
        Self {
            upload: Some(upload),
            key,
            runtime_handle: tokio::runtime::Handle::try_current().ok(),
        }
    }

    async fn write(&mut self, chunk: Bytes) -> StorageResult<()> {
        match self.upload.as_mut() {
            Some(upload) => upload.write(chunk).await,
            None => Err(StorageError::Io(std::io::Error::other(
                "content upload already completed",
            ))),
        }
    }

    async fn finish(mut self) -> StorageResult<u64> {
        match self.upload.take() {
            Some(upload) => upload.finish().await,
            None => Err(StorageError::Io(std::io::Error::other(
                "content upload already completed",
            ))),
        }
    }

    async fn abort(mut self) {
        if let Some(upload) = self.upload.take() {
            abort_upload(upload, &self.key).await;
        }
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        let Some(upload) = self.upload.take() else {
            return;
        };
        let key = self.key;
        match &self.runtime_handle {
            Some(handle) => {
                handle.spawn(async move {
                    match upload.abort().await {
                        Ok(()) => tracing::info!(key = %key, "Aborted interrupted content upload"),
                        Err(e) => tracing::warn!(
                            key = %key,
                            error = %e,
                            "Failed to abort interrupted content upload"
                        ),
                    }
                });
            }
            None => {
                tracing::warn!(
                    key = %key,
                    "Content upload dropped outside a runtime, in-flight object may be left behind"
                );
            }
        }
    }
}

async fn abort_upload(upload: Box<dyn StreamingUpload>, key: &FileKey) {
    if let Err(e) = upload.abort().await {
        tracing::warn!(key = %key, error = %e, "Failed to abort content upload");
    }
}
