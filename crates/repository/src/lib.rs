//! Temporary file repository over an object store.
//!
//! Each [`TemporaryFile`](tempstash_core::TemporaryFile) is stored as two
//! objects in one container: the content, named after the key, and a JSON
//! sidecar named `<key>.metadata`. [`TemporaryFileRepository::sweep`] removes
//! every file whose `available_until` has passed.

pub mod error;
pub mod metrics;
pub mod repository;
pub mod sweep;

pub use error::{RepositoryError, Result};
pub use metrics::register_metrics;
pub use repository::{CONTENT_CHUNK_SIZE, TemporaryFileRepository};
pub use sweep::{SweepOptions, SweepReport};
