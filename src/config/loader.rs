//! Configuration loading from the process environment.
//!
//! Every setting can be given as a command-line flag or an environment
//! variable. A `.env` file in the working directory is read first
//! (see `ConfigArgs::load_env_file`).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::config::schema::{
    BunnyConfig, CacheConfig, ObservabilityConfig, ProxyConfig, RetryConfig, SecurityConfig,
    StorageZoneConfig, TimeoutConfig,
};
use crate::config::validation::{validate_args, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("argument error: {0}")]
    Args(#[from] clap::Error),

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Raw configuration surface, before validation.
#[derive(Debug, Clone, Parser)]
#[command(name = "cms-edge-proxy")]
#[command(about = "Edge reverse proxy with CDN cache invalidation", long_about = None)]
pub struct ConfigArgs {
    /// Origin server base URL.
    #[arg(long, env = "GHOST_URL", default_value = "http://localhost:2368")]
    pub origin_url: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "DEBUG", default_value_t = false, action = ArgAction::Set,
          value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Public base URL; origin redirects are rewritten to it when set.
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    #[arg(long, env = "BUNNYCDN_API_KEY", hide_env_values = true)]
    pub bunny_api_key: Option<String>,

    #[arg(long, env = "BUNNYCDN_PULL_ZONE_ID")]
    pub bunny_pull_zone_id: Option<String>,

    #[arg(long, env = "BUNNYCDN_API_URL", default_value = "https://api.bunny.net")]
    pub bunny_api_url: String,

    #[arg(long, env = "BUNNYCDN_STORAGE_URL", default_value = "https://storage.bunnycdn.com")]
    pub bunny_storage_url: String,

    /// Also delete permanent-cache artifacts from the storage zone.
    #[arg(long, env = "BUNNYCDN_PURGE_OLD_CACHE", default_value_t = false, action = ArgAction::Set,
          value_parser = BoolishValueParser::new())]
    pub purge_old_cache: bool,

    #[arg(long, env = "BUNNYCDN_STORAGE_ZONE_NAME")]
    pub storage_zone_name: Option<String>,

    #[arg(long, env = "BUNNYCDN_STORAGE_ZONE_PASSWORD", hide_env_values = true)]
    pub storage_zone_password: Option<String>,

    #[arg(long, env = "SPAM_BLOCK_ENABLED", default_value_t = true, action = ArgAction::Set,
          value_parser = BoolishValueParser::new())]
    pub spam_block: bool,

    #[arg(long, env = "TRUST_PROXY", default_value_t = true, action = ArgAction::Set,
          value_parser = BoolishValueParser::new())]
    pub trust_proxy: bool,

    #[arg(long, env = "PURGE_DEBOUNCE_MS", default_value_t = 10_000)]
    pub purge_debounce_ms: u64,

    #[arg(long, env = "PURGE_CONCURRENCY", default_value_t = 10)]
    pub purge_concurrency: usize,

    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: u32,

    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value_t = 500)]
    pub retry_base_delay_ms: u64,

    #[arg(long, env = "RETRY_MAX_DELAY_MS", default_value_t = 8000)]
    pub retry_max_delay_ms: u64,

    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,

    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub max_body_bytes: usize,

    /// Prometheus exporter address (e.g. "0.0.0.0:9090").
    #[arg(long, env = "METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,
}

impl ConfigArgs {
    /// Load variables from an env file into the process environment.
    ///
    /// A missing file is fine; any other failure is returned so the caller
    /// can report it once logging is up.
    pub fn load_env_file(path: &Path) -> Option<dotenvy::Error> {
        match dotenvy::from_path(path) {
            Err(e) if !e.not_found() => Some(e),
            _ => None,
        }
    }

    /// Parse flags and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::try_parse()?)
    }

    /// Validate and convert into the immutable runtime configuration.
    pub fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        validate_args(&self).map_err(ConfigError::Validation)?;

        let storage = if self.purge_old_cache {
            Some(StorageZoneConfig {
                name: self.storage_zone_name.unwrap_or_default(),
                password: self.storage_zone_password.unwrap_or_default(),
            })
        } else {
            None
        };

        Ok(ProxyConfig {
            origin_url: self.origin_url.trim_end_matches('/').to_string(),
            port: self.port,
            debug: self.debug,
            public_url: self
                .public_url
                .map(|url| url.trim_end_matches('/').to_string()),
            bunny: BunnyConfig {
                api_key: self.bunny_api_key.unwrap_or_default(),
                pull_zone_id: self.bunny_pull_zone_id.unwrap_or_default(),
                api_base_url: self.bunny_api_url,
                storage_base_url: self.bunny_storage_url,
                storage,
            },
            cache: CacheConfig {
                debounce: Duration::from_millis(self.purge_debounce_ms),
                delete_concurrency: self.purge_concurrency,
            },
            retries: RetryConfig {
                max_attempts: self.retry_max_attempts,
                base_delay_ms: self.retry_base_delay_ms,
                max_delay_ms: self.retry_max_delay_ms,
            },
            timeouts: TimeoutConfig {
                upstream: Duration::from_secs(self.upstream_timeout_secs),
                ..TimeoutConfig::default()
            },
            security: SecurityConfig {
                trust_proxy: self.trust_proxy,
                spam_block: self.spam_block,
                max_body_size: self.max_body_bytes,
            },
            observability: ObservabilityConfig {
                metrics_address: self.metrics_address,
            },
        })
    }
}
