//! Expiry sweep.
//!
//! A sweep lists the whole container page by page, decodes every `.metadata`
//! sidecar it finds and collects the keys whose `available_until` lies
//! strictly before `now`. Deletion starts only after the listing pass, so
//! removing objects never shifts the pages still being read.

use crate::error::{RepositoryError, Result};
use crate::metrics;
use crate::repository::TemporaryFileRepository;
use futures::StreamExt;
use std::collections::BTreeSet;
use tempstash_core::config::SweepConfig;
use tempstash_core::metadata;
use tempstash_core::naming::{is_metadata_name, key_from_metadata_name};
use tempstash_core::FileKey;
use tempstash_storage::{ContinuationToken, ListingOptions, ListingResume, StorageError};
use time::OffsetDateTime;
use tracing::instrument;

/// Tuning for a single sweep.
#[derive(Clone, Debug)]
pub struct SweepOptions {
    /// Keys requested per listing page (clamped by the backend).
    pub page_size: usize,
    /// Stop listing after this many pages; `None` scans the whole container.
    pub max_pages: Option<usize>,
    /// Continue a previous sweep from its `resume_token`.
    pub resume: Option<ContinuationToken>,
    /// Upper bound on concurrent deletions.
    pub delete_concurrency: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self::from(&SweepConfig::default())
    }
}

impl From<&SweepConfig> for SweepOptions {
    fn from(config: &SweepConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            resume: None,
            delete_concurrency: config.delete_concurrency,
        }
    }
}

impl SweepOptions {
    pub fn with_resume(mut self, token: ContinuationToken) -> Self {
        self.resume = Some(token);
        self
    }
}

/// Outcome of a sweep.
#[derive(Clone, Debug, Default)]
pub struct SweepReport {
    /// Keys found expired and selected for deletion, including any whose
    /// deletion failed.
    pub deleted: BTreeSet<FileKey>,
    /// Metadata objects examined.
    pub scanned: usize,
    /// Metadata objects ignored because they vanished, did not decode or
    /// were not named after a key.
    pub skipped: usize,
    /// Expired keys whose objects could not be removed.
    pub delete_failures: usize,
    /// Set when `max_pages` stopped the listing before the end; pass it back
    /// through [`SweepOptions::resume`] to continue.
    pub resume_token: Option<ContinuationToken>,
}

/// What the sweep decided about one metadata object.
enum Examined {
    Expired(FileKey),
    Live,
    Skipped,
}

impl TemporaryFileRepository {
    /// Delete every file that expired strictly before `now`, using the
    /// repository's configured sweep options.
    pub async fn sweep(&self, now: OffsetDateTime) -> Result<SweepReport> {
        let options = SweepOptions::from(self.sweep_defaults());
        self.sweep_with(now, options).await
    }

    /// Delete every file that expired strictly before `now`.
    ///
    /// Listing failures and non-`NotFound` download failures abort the sweep
    /// before anything is deleted. Individual delete failures are counted in
    /// the report and do not fail the sweep.
    #[instrument(skip(self, options), fields(backend = self.object_store().backend_name()))]
    pub async fn sweep_with(
        &self,
        now: OffsetDateTime,
        options: SweepOptions,
    ) -> Result<SweepReport> {
        tracing::info!(now = %now, "Running expiry sweep");
        metrics::SWEEP_RUNS.inc();

        let store = self.object_store();
        store.ensure_container().await.map_err(RepositoryError::Sweep)?;

        let mut report = SweepReport::default();
        let resume = options.resume.clone().map(ListingResume::new);
        let mut pages = store.list_pages("", ListingOptions::new(options.page_size), resume);
        let mut pages_read = 0usize;

        while let Some(page) = pages.next().await {
            let page = page.map_err(RepositoryError::Sweep)?;
            pages_read += 1;

            for name in page.keys.iter().filter(|name| is_metadata_name(name)) {
                report.scanned += 1;
                match self.examine(name, now).await? {
                    Examined::Expired(key) => {
                        report.deleted.insert(key);
                    }
                    Examined::Live => {}
                    Examined::Skipped => report.skipped += 1,
                }
            }

            if options.max_pages.is_some_and(|max| pages_read >= max) {
                report.resume_token = page.next_token;
                break;
            }
        }
        drop(pages);

        tracing::info!(
            expired = report.deleted.len(),
            scanned = report.scanned,
            skipped = report.skipped,
            "Found expired keys to delete"
        );

        let concurrency = options.delete_concurrency.max(1);
        let failures = futures::stream::iter(report.deleted.iter().copied())
            .map(|key| async move { (key, self.delete_objects(key).await) })
            .buffer_unordered(concurrency)
            .filter_map(|(key, result)| async move {
                result.err().map(|e| {
                    tracing::warn!(key = %key, error = %e, "Failed to delete expired file");
                })
            })
            .count()
            .await;
        report.delete_failures = failures;

        metrics::SWEEP_EXPIRED.inc_by(report.deleted.len() as u64);
        metrics::SWEEP_SKIPPED.inc_by(report.skipped as u64);
        metrics::SWEEP_DELETE_FAILURES.inc_by(report.delete_failures as u64);

        tracing::info!(
            deleted = report.deleted.len() - report.delete_failures,
            delete_failures = report.delete_failures,
            resumable = report.resume_token.is_some(),
            "Expiry sweep complete"
        );
        Ok(report)
    }

    async fn examine(&self, name: &str, now: OffsetDateTime) -> Result<Examined> {
        let Some(key) = key_from_metadata_name(name) else {
            tracing::warn!(object = name, "Skipping metadata object not named after a key");
            return Ok(Examined::Skipped);
        };

        let raw = match self.object_store().get(name).await {
            Ok(raw) => raw,
            Err(StorageError::NotFound(_)) => {
                tracing::warn!(object = name, "Metadata object vanished during sweep");
                return Ok(Examined::Skipped);
            }
            Err(e) => return Err(RepositoryError::Sweep(e)),
        };

        let record = match metadata::decode(&raw) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(object = name, error = %e, "Skipping undecodable metadata");
                return Ok(Examined::Skipped);
            }
        };
        if record.key != key {
            tracing::warn!(
                object = name,
                recorded_key = %record.key,
                "Metadata records a different key than its object name"
            );
        }

        if record.is_expired_at(now) {
            Ok(Examined::Expired(key))
        } else {
            Ok(Examined::Live)
        }
    }
}
