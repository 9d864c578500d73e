//! CMS edge proxy.
//!
//! Sits between the CDN and a Ghost origin.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                   EDGE PROXY                     │
//!   CDN / client     │  ┌───────────┐   ┌──────────┐   ┌─────────────┐  │
//!   ─────────────────┼─▶│ normalize │──▶│   spam   │──▶│    proxy    │──┼──▶ Ghost
//!                    │  │  (301)    │   │  filter  │   │   manager   │  │    origin
//!   ◀────────────────┼──┴───────────┴───┴──────────┴───┤ (streaming) │◀─┼───
//!                    │                                  └──────┬──────┘  │
//!                    │                    x-cache-invalidate   │         │
//!                    │                                         ▼         │
//!                    │                                  ┌─────────────┐  │
//!                    │                                  │    cache    │──┼──▶ CDN API
//!                    │                                  │   manager   │  │    + storage
//!                    │                                  │ (debounced) │  │
//!                    │                                  └─────────────┘  │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::process::ExitCode;

use cms_edge_proxy::config::{ConfigArgs, ConfigError};
use cms_edge_proxy::lifecycle::startup;
use cms_edge_proxy::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let env_file_error = ConfigArgs::load_env_file(Path::new(".env"));
    let args = match ConfigArgs::from_env() {
        Ok(args) => args,
        Err(ConfigError::Args(e)) => e.exit(),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(args.debug);
    tracing::info!("cms-edge-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = env_file_error {
        tracing::warn!(error = %e, "Ignoring unreadable .env file");
    }

    let config = match args.into_config() {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            for error in &errors {
                tracing::error!(error = %error, "Invalid configuration");
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = startup::run(config).await {
        tracing::error!(error = %e, "Fatal error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
