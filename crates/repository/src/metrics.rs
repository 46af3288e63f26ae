//! Prometheus counters for repository operations.
//!
//! Counters are process-global. Nothing is exported until
//! [`register_metrics`] attaches them to a registry.

use prometheus::{IntCounter, Registry};
use std::sync::LazyLock;

pub static FILES_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_files_stored_total",
        "Total number of temporary files stored",
    )
    .expect("metric creation failed")
});

pub static FETCH_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_fetch_hits_total",
        "Total number of fetches that returned a temporary file",
    )
    .expect("metric creation failed")
});

pub static FETCH_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_fetch_misses_total",
        "Total number of fetches that found no complete temporary file",
    )
    .expect("metric creation failed")
});

pub static FILES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_files_deleted_total",
        "Total number of explicit deletes",
    )
    .expect("metric creation failed")
});

pub static SWEEP_RUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("tempstash_sweep_runs_total", "Total number of expiry sweeps")
        .expect("metric creation failed")
});

pub static SWEEP_EXPIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_sweep_expired_total",
        "Total number of expired keys selected for deletion by sweeps",
    )
    .expect("metric creation failed")
});

pub static SWEEP_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_sweep_skipped_total",
        "Total number of metadata objects skipped by sweeps (vanished or undecodable)",
    )
    .expect("metric creation failed")
});

pub static SWEEP_DELETE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tempstash_sweep_delete_failures_total",
        "Total number of expired keys a sweep failed to delete",
    )
    .expect("metric creation failed")
});

/// Register every repository counter with `registry`.
///
/// Fails with `AlreadyReg` if called twice for the same registry.
pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(FILES_STORED.clone()))?;
    registry.register(Box::new(FETCH_HITS.clone()))?;
    registry.register(Box::new(FETCH_MISSES.clone()))?;
    registry.register(Box::new(FILES_DELETED.clone()))?;
    registry.register(Box::new(SWEEP_RUNS.clone()))?;
    registry.register(Box::new(SWEEP_EXPIRED.clone()))?;
    registry.register(Box::new(SWEEP_SKIPPED.clone()))?;
    registry.register(Box::new(SWEEP_DELETE_FAILURES.clone()))?;
    Ok(())
}
