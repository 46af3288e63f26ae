//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid file key: {0}")]
    InvalidKey(String),

    #[error("metadata encode error: {0}")]
    MetadataEncode(String),

    #[error("metadata decode error: {0}")]
    MetadataDecode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
