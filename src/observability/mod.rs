//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request path and purge cycles produce:
//!     → logging.rs (structured log events, request-id spans)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;
