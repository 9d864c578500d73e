//! Edge proxy for a Ghost CMS origin with debounced CDN cache purging.

pub mod cache;
pub mod cdn;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use cache::{CacheManager, PurgeScheduler};
pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
