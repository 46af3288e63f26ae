//! Object names derived from file keys.
//!
//! Every temporary file is stored as two objects: the content under
//! [`content_name`] and the metadata sidecar under [`metadata_name`]. Nothing
//! else should build these names by hand.

use crate::key::FileKey;

/// Suffix reserved for metadata sidecar objects.
///
/// A dot never appears in a canonical key, so no content name can end with it.
pub const METADATA_SUFFIX: &str = ".metadata";

/// Name of the content object for `key`.
pub fn content_name(key: &FileKey) -> String {
    key.to_string()
}

/// Name of the metadata object for `key`.
pub fn metadata_name(key: &FileKey) -> String {
    format!("{key}{METADATA_SUFFIX}")
}

/// Whether `name` carries the metadata suffix.
pub fn is_metadata_name(name: &str) -> bool {
    name.ends_with(METADATA_SUFFIX)
}

/// Recover the key from a metadata object name.
///
/// Returns `None` for names without the suffix or whose stem is not a
/// canonical key (foreign objects in a shared container).
pub fn key_from_metadata_name(name: &str) -> Option<FileKey> {
    let stem = name.strip_suffix(METADATA_SUFFIX)?;
    FileKey::parse(stem).ok()
}
