//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy handler as catch-all
//! - Wire up middleware (request ID, tracing, body limit, path normalization)
//! - Build the cache manager and hand it to the proxy as purge scheduler
//! - Serve until the shutdown signal fires

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::LengthLimitError;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::cache::{CacheManager, PurgeScheduler, PurgeTarget};
use crate::cdn::{CdnClient, PooledTransport};
use crate::config::ProxyConfig;
use crate::http::normalize::normalize_path;
use crate::http::proxy::ProxyManager;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::lifecycle::startup::StartupError;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::security::{SpamFilter, Verdict};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyManager>,
    pub spam: Arc<SpamFilter>,
    pub max_body_size: usize,
}

/// HTTP server for the edge proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server whose purges go to the configured CDN.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let transport = PooledTransport::new(&config.timeouts).map_err(StartupError::Client)?;
        let cdn = CdnClient::from_config(transport, &config.bunny)?;
        let cache = CacheManager::new(
            cdn,
            PurgeTarget::from(&config.bunny),
            &config.cache,
            RetryPolicy::from(&config.retries),
        );
        Self::with_scheduler(config, Arc::new(cache))
    }

    /// Create a server with a caller-supplied purge scheduler.
    pub fn with_scheduler(config: ProxyConfig, scheduler: Arc<dyn PurgeScheduler>) -> Result<Self, StartupError> {
        let proxy = ProxyManager::new(&config, scheduler).map_err(StartupError::Client)?;
        let state = AppState {
            proxy: Arc::new(proxy),
            spam: Arc::new(SpamFilter::new(config.security.spam_block)),
            max_body_size: config.security.max_body_size,
        };

        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    fn build_router(state: AppState) -> Router {
        let max_body_size = state.max_body_size;
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(middleware::from_fn(normalize_path))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            request_id = %request_id(request),
                            method = %request.method(),
                            uri = %request.uri(),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(max_body_size)),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origin = %self.config.origin_url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Catch-all handler: buffer body, filter spam, forward to origin.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();

    let body = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let status = body_error_status(&e);
            tracing::warn!(
                error = %e,
                status = status.as_u16(),
                limit = state.max_body_size,
                "Failed to read request body"
            );
            metrics::record_request(method.as_str(), status.as_u16(), start);
            return status.into_response();
        }
    };

    if let Verdict::Block(signature) = state
        .spam
        .inspect(&parts.method, parts.uri.path(), &parts.headers, &body)
    {
        tracing::warn!(
            signature,
            path = %parts.uri.path(),
            client = %peer,
            "Blocked spam request"
        );
        metrics::record_spam_blocked(signature);
        metrics::record_request(method.as_str(), 403, start);
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let response = match state.proxy.forward(parts, body, peer).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "Error during proxy operation");
            metrics::record_origin_error(e.kind());
            e.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

/// 413 when the body exceeded the limit, 400 for any other read failure.
fn body_error_status(error: &axum::Error) -> StatusCode {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        current = e.source();
    }
    StatusCode::BAD_REQUEST
}
