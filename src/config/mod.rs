//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file + process environment + flags
//!     → loader.rs (clap parse into ConfigArgs)
//!     → validation.rs (semantic checks, all errors collected)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Storage credentials only exist when storage cleanup is enabled
//! - Any validation error is fatal before the listener is bound

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigArgs, ConfigError};
pub use schema::{
    BunnyConfig, CacheConfig, ObservabilityConfig, ProxyConfig, RetryConfig, SecurityConfig,
    StorageZoneConfig, TimeoutConfig,
};
