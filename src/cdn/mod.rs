//! CDN integration subsystem.
//!
//! # Data Flow
//! ```text
//! cache manager
//!     → client.rs (build URL, issue one call, decode result)
//!     → transport.rs (pooled keep-alive client, AccessKey auth)
//!     → CDN control plane / storage API
//! ```
//!
//! # Design Decisions
//! - The remote APIs are black boxes: thin request/parse pairs only
//! - `CdnApi` is the seam the cache manager is generic over
//! - No retries here; see `resilience::retries`

pub mod client;
pub mod transport;
pub mod types;

pub use client::CdnClient;
pub use transport::{PooledTransport, RequestOptions};
pub use types::{CdnApi, FileDetail, PullZone, RemoteApiError, PERMA_CACHE_DIR};
