//! Configuration schema definitions.
//!
//! `ProxyConfig` is the validated, immutable view of the process
//! configuration. It is built once by the loader and shared via `Arc`.

use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration for the edge proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Origin base URL without a trailing slash (e.g. "http://localhost:2368").
    pub origin_url: String,

    /// Port the proxy listens on.
    pub port: u16,

    /// Verbose logging of request/response headers.
    pub debug: bool,

    /// Public base URL used to rewrite origin redirects, if any.
    pub public_url: Option<String>,

    /// CDN credentials and purge target.
    pub bunny: BunnyConfig,

    /// Debounce and fan-out settings for cache purges.
    pub cache: CacheConfig,

    /// Retry policy for CDN/storage calls.
    pub retries: RetryConfig,

    /// Timeouts for outbound calls.
    pub timeouts: TimeoutConfig,

    /// Request filtering and client identity settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// Address the proxy binds to.
    pub fn listen_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// CDN control-plane configuration.
#[derive(Debug, Clone)]
pub struct BunnyConfig {
    /// Account API key sent as `AccessKey`.
    pub api_key: String,

    /// Pull zone whose edge cache gets purged.
    pub pull_zone_id: String,

    /// Control-plane base URL.
    pub api_base_url: String,

    /// Storage API base URL.
    pub storage_base_url: String,

    /// Storage-zone cleanup credentials. `Some` iff cleanup is enabled.
    pub storage: Option<StorageZoneConfig>,
}

/// Storage zone backing the pull zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageZoneConfig {
    pub name: String,
    pub password: String,
}

/// Cache purge scheduling.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Quiet period after the last invalidation signal before purging.
    pub debounce: Duration,

    /// Maximum storage deletions in flight at once.
    pub delete_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(10),
            delete_concurrency: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per remote call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Time allowed for the origin to produce response headers.
    pub upstream: Duration,

    /// Connection establishment timeout.
    pub connect: Duration,

    /// Total time allowed for a single CDN/storage API call.
    pub remote_api: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream: Duration::from_secs(30),
            connect: Duration::from_secs(5),
            remote_api: Duration::from_secs(30),
        }
    }
}

/// Security configuration.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Honour `x-original-forwarded-for` set by a trusted upstream layer.
    pub trust_proxy: bool,

    /// Reject requests matching known spam signatures.
    pub spam_block: bool,

    /// Maximum buffered request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            trust_proxy: true,
            spam_block: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    /// Prometheus exporter bind address; disabled when `None`.
    pub metrics_address: Option<SocketAddr>,
}
