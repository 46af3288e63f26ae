use bytes::Bytes;
use std::sync::Arc;
use tempstash_core::{FileKey, TemporaryFile};
use tempstash_repository::TemporaryFileRepository;
use tempstash_storage::{MemoryBackend, ObjectStore};
use time::OffsetDateTime;

/// A repository over a fresh in-memory backend, plus a handle to inspect it.
#[allow(dead_code)]
pub fn memory_repository() -> (MemoryBackend, TemporaryFileRepository) {
    let backend = MemoryBackend::new();
    let repo = TemporaryFileRepository::new(Arc::new(backend.clone()));
    (backend, repo)
}

#[allow(dead_code)]
pub fn repository_over<S: ObjectStore>(store: S) -> TemporaryFileRepository {
    TemporaryFileRepository::new(Arc::new(store))
}

/// A temporary file with a fresh key and in-memory content.
#[allow(dead_code)]
pub fn file_with(
    name: &str,
    available_until: OffsetDateTime,
    content: &'static [u8],
) -> TemporaryFile {
    TemporaryFile::from_bytes(
        FileKey::new(),
        name,
        available_until,
        Bytes::from_static(content),
    )
}
