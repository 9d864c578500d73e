//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace span, body limit)
//!     → normalize.rs (301 for repeated slashes)
//!     → server.rs handler (buffer body, spam filter)
//!     → proxy.rs (forward to origin, stream response back)
//!     → response.rs (maintenance page on failure, Location rewrite)
//!     → Send to client
//!     → on body end: purge scheduled if x-cache-invalidate was set
//! ```

pub mod normalize;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::{ProxyManager, X_CACHE_INVALIDATE};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::{ProxyError, MAINTENANCE_HTML};
pub use server::{AppState, HttpServer};
