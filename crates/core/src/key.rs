//! Identity keys for temporary files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identity of one temporary file, shared by its content and metadata objects.
///
/// The canonical string form is the lowercase hyphenated UUID, which is also
/// the content object name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(Uuid);

impl FileKey {
    /// Generate a new random key.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string.
    ///
    /// Only the canonical hyphenated form is accepted so that parsing an object
    /// name and formatting the key back yields the same name.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let uuid = Uuid::try_parse(s)
            .map_err(|e| crate::Error::InvalidKey(format!("invalid file key {s:?}: {e}")))?;
        let key = Self(uuid);
        if key.to_string() != s {
            return Err(crate::Error::InvalidKey(format!(
                "file key {s:?} is not in canonical form"
            )));
        }
        Ok(key)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileKey {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FileKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for FileKey {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileKey({})", self.0)
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase_hyphenated() {
        let uuid = Uuid::parse_str("6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap();
        let key = FileKey::from_uuid(uuid);
        assert_eq!(key.to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    }

    #[test]
    fn parse_accepts_canonical_form() {
        let key = FileKey::new();
        let parsed = FileKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn parse_rejects_non_canonical_forms() {
        assert!(FileKey::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF").is_err());
        assert!(FileKey::parse("6f9619ff8b86d011b42d00c04fc964ff").is_err());
        assert!(FileKey::parse("{6f9619ff-8b86-d011-b42d-00c04fc964ff}").is_err());
        assert!(FileKey::parse("not-a-key").is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let key = FileKey::new();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{key}\""));
    }
}
