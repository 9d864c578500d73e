//! Per-cycle purge reporting.

use std::time::Duration;

use crate::observability::metrics;

/// Result of the storage-zone cleanup branch of one purge cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageCleanupOutcome {
    /// Objects returned by the listing call.
    pub listed: usize,
    /// Objects matching the pull zone name, i.e. deletions attempted.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Time spent resolving the zone name and listing objects.
    pub fetch_elapsed: Duration,
    /// Time spent on deletions.
    pub delete_elapsed: Duration,
    /// Set when cleanup stopped before any deletion was attempted.
    pub error: Option<String>,
}

impl StorageCleanupOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

/// Result of one purge cycle. Used only for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Error from the edge cache purge, after retries.
    pub cdn_error: Option<String>,
    pub cdn_elapsed: Duration,
    /// `None` when storage cleanup is disabled.
    pub storage: Option<StorageCleanupOutcome>,
    pub elapsed: Duration,
}

impl PurgeOutcome {
    pub fn cdn_purged(&self) -> bool {
        self.cdn_error.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.cdn_purged() && self.storage.as_ref().map_or(true, StorageCleanupOutcome::is_complete)
    }

    /// Log the outcome and record cycle metrics.
    pub fn report(&self) {
        match &self.cdn_error {
            None => tracing::info!(elapsed = ?self.cdn_elapsed, "CDN cache purged"),
            Some(error) => tracing::error!(error = %error, "CDN cache purge failed"),
        }

        if let Some(storage) = &self.storage {
            if let Some(error) = &storage.error {
                tracing::error!(
                    error = %error,
                    fetch_elapsed = ?storage.fetch_elapsed,
                    "Storage cleanup aborted before deleting"
                );
            } else {
                let per_file_ms = if storage.attempted > 0 {
                    storage.delete_elapsed.as_secs_f64() * 1000.0 / storage.attempted as f64
                } else {
                    0.0
                };
                tracing::info!(
                    listed = storage.listed,
                    attempted = storage.attempted,
                    succeeded = storage.succeeded,
                    failed = storage.failed,
                    fetch_elapsed = ?storage.fetch_elapsed,
                    delete_elapsed = ?storage.delete_elapsed,
                    per_file_ms = format_args!("{:.1}", per_file_ms),
                    "Storage cleanup finished"
                );
            }
        }

        if self.is_complete() {
            tracing::info!(elapsed = ?self.elapsed, "Cache purge cycle completed");
        } else {
            // Leftovers are re-listed and retried on the next invalidation.
            tracing::warn!(elapsed = ?self.elapsed, "Cache purge cycle completed with failures");
        }

        metrics::record_purge_cycle(self);
    }
}
