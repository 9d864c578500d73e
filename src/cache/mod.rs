//! Cache invalidation subsystem.
//!
//! # Data Flow
//! ```text
//! origin response with x-cache-invalidate
//!     → PurgeScheduler::schedule_debounced_purge (returns immediately)
//!     → manager.rs (cancel pending timer, start a new one)
//!     → timer fires: purge cycle detached onto its own task
//!         ├─ edge cache purge (retried)
//!         └─ storage cleanup (resolve zone name + list, filter, bounded deletes)
//!     → outcome.rs (log + metrics)
//! ```
//!
//! # Design Decisions
//! - The proxy does not cache content; it only invalidates the CDN
//! - Purge failures never reach a client response

pub mod manager;
pub mod outcome;

pub use manager::{CacheManager, PurgeScheduler, PurgeTarget};
pub use outcome::{PurgeOutcome, StorageCleanupOutcome};
