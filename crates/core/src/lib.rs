//! Core domain types shared by the tempstash crates.
//!
//! This crate defines:
//! - File keys and the logical temporary file model
//! - The metadata sidecar record and its JSON codec
//! - The naming scheme mapping keys to object names
//! - Repository and storage configuration

pub mod config;
pub mod error;
pub mod file;
pub mod key;
pub mod metadata;
pub mod naming;

pub use config::{StorageConfig, SweepConfig, TemporaryFileSettings};
pub use error::{Error, Result};
pub use file::{ContentReader, ContentSource, PathSource, TemporaryFile};
pub use key::FileKey;
pub use metadata::MetaDataFile;
pub use naming::{METADATA_SUFFIX, content_name, metadata_name};
