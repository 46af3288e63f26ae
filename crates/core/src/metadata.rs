//! Metadata sidecar record and its JSON codec.

use crate::file::TemporaryFile;
use crate::key::FileKey;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

/// Persisted projection of a [`TemporaryFile`] without its content.
///
/// Wire form is a UTF-8 JSON object:
///
/// ```json
/// {"fileName":"a.txt","key":"6f9619ff-8b86-d011-b42d-00c04fc964ff","availableUntil":"2024-01-01T00:00:00Z"}
/// ```
///
/// All three fields are required. Unknown fields are ignored when decoding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDataFile {
    /// Display name of the original file.
    pub file_name: String,
    /// Identity key shared with the content object.
    pub key: FileKey,
    /// Instant after which the file may be swept. Always written in UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub available_until: OffsetDateTime,
}

impl MetaDataFile {
    /// Whether the record is strictly expired at `now`.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.available_until < now
    }
}

impl From<&TemporaryFile> for MetaDataFile {
    fn from(file: &TemporaryFile) -> Self {
        Self {
            file_name: file.file_name.clone(),
            key: file.key,
            available_until: in_utc(file.available_until),
        }
    }
}

/// RFC 3339 cannot carry offsets with a seconds component, so the wire form
/// is always UTC. Instants that do not fit in UTC are left for `encode` to reject.
fn in_utc(instant: OffsetDateTime) -> OffsetDateTime {
    instant.checked_to_offset(UtcOffset::UTC).unwrap_or(instant)
}

/// Encode a metadata record to its wire form.
pub fn encode(metadata: &MetaDataFile) -> crate::Result<Bytes> {
    let normalized;
    let metadata = if metadata.available_until.offset().is_utc() {
        metadata
    } else {
        normalized = MetaDataFile {
            available_until: in_utc(metadata.available_until),
            ..metadata.clone()
        };
        &normalized
    };
    serde_json::to_vec(metadata)
        .map(Bytes::from)
        .map_err(|e| crate::Error::MetadataEncode(e.to_string()))
}

/// Decode a metadata record from its wire form.
pub fn decode(data: &[u8]) -> crate::Result<MetaDataFile> {
    serde_json::from_slice(data).map_err(|e| crate::Error::MetadataDecode(e.to_string()))
}
