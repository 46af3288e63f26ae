//! Object storage abstraction and backends for tempstash.
//!
//! Every store is scoped to one container: a directory for the filesystem
//! backend, a bucket for S3, a map for the in-memory backend.

pub mod backends;
pub mod error;
pub mod token;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryBackend, s3::S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{
    ContinuationToken, KeyStream, ListingCapabilities, ListingOptions, ListingPage, ListingResume,
    ObjectStore, ObjectStoreListStreamExt, PageStream, StreamingUpload,
};

use std::sync::Arc;
use tempstash_core::config::{StorageConfig, validate_container_name};

/// Create an object store for `container` from configuration.
///
/// The container itself is not created here; call
/// [`ObjectStore::ensure_container`] before writing.
pub async fn from_config(
    config: &StorageConfig,
    container: &str,
) -> StorageResult<Arc<dyn ObjectStore>> {
    validate_container_name(container).map_err(StorageError::Config)?;
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path.join(container)).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::S3 {
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                container,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
