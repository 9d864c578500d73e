//! Startup orchestration.
//!
//! # Responsibilities
//! - Install the metrics exporter when configured
//! - Build clients and the cache manager
//! - Bind the listener last and serve until a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Configuration is validated before this point

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cdn::RemoteApiError;
use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid CDN endpoint: {0}")]
    Cdn(#[from] RemoteApiError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Start every subsystem and serve until SIGINT/SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    if let Some(addr) = config.observability.metrics_address {
        metrics::init_metrics(addr)?;
    }

    tracing::info!(
        origin = %config.origin_url,
        pull_zone_id = %config.bunny.pull_zone_id,
        storage_cleanup = config.bunny.storage.is_some(),
        debounce = ?config.cache.debounce,
        spam_block = config.security.spam_block,
        "Configuration loaded"
    );

    let address = config.listen_address();
    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    let notified = shutdown.notified();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, notified).await.map_err(StartupError::Serve)?;
    tracing::info!("Shutdown complete");
    Ok(())
}
