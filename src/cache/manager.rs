//! Debounced CDN cache purging.
//!
//! # Responsibilities
//! - Coalesce bursts of invalidation signals into one purge cycle
//! - Purge the pull zone's edge cache
//! - Delete stale permanent-cache artifacts from the storage zone
//! - Bound in-flight storage deletions; retry every remote call
//!
//! # Design Decisions
//! - One pending timer slot, replaced under a mutex on every signal
//! - A cycle that has started is detached from the timer and always runs
//!   to completion; new signals schedule the next cycle
//! - Edge purge and storage cleanup are independent side effects
//! - Failed deletions are reported, not retried beyond the per-call
//!   policy; the next cycle re-lists and picks them up

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::task::JoinHandle;

use crate::cache::outcome::{PurgeOutcome, StorageCleanupOutcome};
use crate::cdn::{CdnApi, FileDetail, PERMA_CACHE_DIR};
use crate::config::{BunnyConfig, CacheConfig, StorageZoneConfig};
use crate::resilience::{with_retry, RetryPolicy};

/// Entry point used by the request path to request a purge.
///
/// Implementations must return immediately.
pub trait PurgeScheduler: Send + Sync {
    fn schedule_debounced_purge(&self);
}

/// What to purge and with which credentials.
#[derive(Debug, Clone)]
pub struct PurgeTarget {
    pub pull_zone_id: String,
    pub api_key: String,
    pub storage: Option<StorageZoneConfig>,
}

impl From<&BunnyConfig> for PurgeTarget {
    fn from(config: &BunnyConfig) -> Self {
        Self {
            pull_zone_id: config.pull_zone_id.clone(),
            api_key: config.api_key.clone(),
            storage: config.storage.clone(),
        }
    }
}

/// Owns purge policy and the single pending-timer slot.
pub struct CacheManager<C: CdnApi> {
    purger: Arc<Purger<C>>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<C: CdnApi> CacheManager<C> {
    pub fn new(cdn: C, target: PurgeTarget, cache: &CacheConfig, retry: RetryPolicy) -> Self {
        Self {
            purger: Arc::new(Purger {
                cdn,
                target,
                retry,
                delete_concurrency: cache.delete_concurrency.max(1),
            }),
            debounce: cache.debounce,
            pending: Mutex::new(None),
        }
    }

    /// Run a purge cycle immediately, bypassing the debounce timer.
    pub async fn purge_now(&self) -> PurgeOutcome {
        self.purger.run_cycle().await
    }

    /// True while a scheduled purge is waiting for its timer.
    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .expect("purge timer mutex poisoned")
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl<C: CdnApi> PurgeScheduler for CacheManager<C> {
    fn schedule_debounced_purge(&self) {
        let mut pending = self.pending.lock().expect("purge timer mutex poisoned");
        if let Some(timer) = pending.take() {
            if !timer.is_finished() {
                timer.abort();
                tracing::debug!("Replacing pending cache purge timer");
            }
        }

        let purger = Arc::clone(&self.purger);
        let delay = self.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so that replacing the timer cannot cancel a running cycle.
            tokio::spawn(async move {
                purger.run_cycle().await.report();
            });
        }));

        tracing::info!(delay = ?delay, "Cache purge scheduled");
    }
}

struct Purger<C> {
    cdn: C,
    target: PurgeTarget,
    retry: RetryPolicy,
    delete_concurrency: usize,
}

impl<C: CdnApi> Purger<C> {
    async fn run_cycle(&self) -> PurgeOutcome {
        let started = Instant::now();
        tracing::info!(
            pull_zone_id = %self.target.pull_zone_id,
            storage_cleanup = self.target.storage.is_some(),
            "Starting cache purge cycle"
        );

        let storage_cleanup = async {
            match &self.target.storage {
                Some(zone) => Some(self.clean_storage_zone(zone).await),
                None => None,
            }
        };
        let ((cdn_result, cdn_elapsed), storage) = tokio::join!(self.purge_edge_cache(), storage_cleanup);

        PurgeOutcome {
            cdn_error: cdn_result.err(),
            cdn_elapsed,
            storage,
            elapsed: started.elapsed(),
        }
    }

    async fn purge_edge_cache(&self) -> (Result<(), String>, Duration) {
        let started = Instant::now();
        let cdn = &self.cdn;
        let target = &self.target;
        let result = with_retry(&self.retry, "purge_pull_zone_cache", || {
            cdn.purge_pull_zone_cache(&target.pull_zone_id, &target.api_key)
        })
        .await
        .map_err(|e| e.to_string());
        (result, started.elapsed())
    }

    async fn clean_storage_zone(&self, zone: &StorageZoneConfig) -> StorageCleanupOutcome {
        let mut outcome = StorageCleanupOutcome::default();
        let cdn = &self.cdn;
        let target = &self.target;
        let retry = &self.retry;

        let fetch_started = Instant::now();
        let (zone_name, listing) = tokio::join!(
            with_retry(retry, "resolve_pull_zone_name", || {
                cdn.resolve_pull_zone_name(&target.pull_zone_id, &target.api_key)
            }),
            with_retry(retry, "list_storage_objects", || {
                cdn.list_storage_objects(&zone.name, PERMA_CACHE_DIR, &zone.password)
            }),
        );
        outcome.fetch_elapsed = fetch_started.elapsed();

        let (zone_name, files) = match (zone_name, listing) {
            (Ok(name), Ok(files)) => (name, files),
            (Err(e), _) | (_, Err(e)) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        tracing::debug!(
            zone_name = %zone_name,
            listed = files.len(),
            elapsed = ?outcome.fetch_elapsed,
            "Fetched zone name and storage listing"
        );

        outcome.listed = files.len();
        let matching = select_zone_objects(files, &zone_name);
        outcome.attempted = matching.len();
        tracing::info!(matching = matching.len(), "Deleting stale storage objects");

        let delete_started = Instant::now();
        let results: Vec<bool> = stream::iter(matching.into_iter().map(|file| file.object_name))
            .map(|object_name: String| async move {
                let deleted = with_retry(retry, "delete_storage_object", || {
                    cdn.delete_storage_object(&zone.name, PERMA_CACHE_DIR, &object_name, &zone.password)
                })
                .await;
                match deleted {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(object = %object_name, error = %e, "Failed to delete storage object");
                        false
                    }
                }
            })
            .buffer_unordered(self.delete_concurrency)
            .collect()
            .await;
        outcome.delete_elapsed = delete_started.elapsed();

        outcome.succeeded = results.iter().filter(|deleted| **deleted).count();
        outcome.failed = results.len() - outcome.succeeded;
        outcome
    }
}

/// Objects belonging to the pull zone. The storage API is not zone-scoped,
/// so ownership is decided by the zone name appearing in the object name.
fn select_zone_objects(files: Vec<FileDetail>, zone_name: &str) -> Vec<FileDetail> {
    if zone_name.is_empty() {
        return Vec::new();
    }
    files
        .into_iter()
        .filter(|file| file.object_name.contains(zone_name))
        .collect()
}
