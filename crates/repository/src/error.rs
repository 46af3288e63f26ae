//! Repository error types.

use tempstash_core::FileKey;
use tempstash_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by [`TemporaryFileRepository`](crate::TemporaryFileRepository).
///
/// Absence is never an error: missing or undecodable entities come back as
/// `Ok(None)` from fetch and are skipped by the sweep.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to store temporary file {key}: {source}")]
    Store {
        key: FileKey,
        #[source]
        source: StorageError,
    },

    #[error("failed to read content of temporary file {key}: {source}")]
    Content {
        key: FileKey,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch temporary file {key}: {source}")]
    Fetch {
        key: FileKey,
        #[source]
        source: StorageError,
    },

    #[error("failed to delete temporary file {key}: {source}")]
    Delete {
        key: FileKey,
        #[source]
        source: StorageError,
    },

    #[error("expiry sweep failed: {0}")]
    Sweep(#[source] StorageError),

    #[error("metadata encoding failed: {0}")]
    Encode(#[from] tempstash_core::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RepositoryError {
    /// Whether the operation may succeed if the caller retries it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store { source, .. }
            | Self::Fetch { source, .. }
            | Self::Delete { source, .. }
            | Self::Sweep(source) => source.is_transient(),
            Self::Content { .. } | Self::Encode(_) | Self::Config(_) => false,
        }
    }

    /// The storage error behind this failure, if any.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Store { source, .. }
            | Self::Fetch { source, .. }
            | Self::Delete { source, .. }
            | Self::Sweep(source) => Some(source),
            _ => None,
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
