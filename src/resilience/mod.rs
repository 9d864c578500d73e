//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Remote CDN/storage call:
//!     → retries.rs (run, classify failure, retry transient ones)
//!     → backoff.rs (exponential delay + jitter between attempts)
//!     → last error surfaced to the caller after the final attempt
//! ```
//!
//! # Design Decisions
//! - Retries wrap the call site, not the client: the client knows how to
//!   call, the caller decides how many times
//! - Structurally invalid requests are never retried
//! - The origin path is not retried; a failed forward yields the
//!   maintenance page

pub mod backoff;
pub mod retries;

pub use retries::{with_retry, RetryPolicy, Retryable};
