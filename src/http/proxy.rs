//! Origin forwarding.
//!
//! # Responsibilities
//! - Forward each request to the origin with forwarding headers
//! - Relay the origin response as-is, streaming, redirects included
//! - Schedule a CDN purge when the origin marks a response with
//!   `x-cache-invalidate`
//!
//! # Design Decisions
//! - Origin TLS certificates are not verified (origin sits on a private network)
//! - Redirects are never followed; the client sees the origin's 3xx
//! - The purge trigger fires once the relayed body finishes, or when the
//!   relay is dropped early, never before the response starts
//! - The origin timeout covers the response head, not the body stream

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{request::Parts, HeaderName};
use axum::response::Response;
use futures_util::Stream;
use url::Url;

use crate::cache::PurgeScheduler;
use crate::config::ProxyConfig;
use crate::http::response::{LocationRewrite, ProxyError};
use crate::security::headers::{client_ip, prepare_origin_headers, strip_hop_by_hop};

/// Response header through which the origin requests a cache purge.
pub const X_CACHE_INVALIDATE: HeaderName = HeaderName::from_static("x-cache-invalidate");

/// Reverse-proxy transport to the origin.
pub struct ProxyManager {
    client: reqwest::Client,
    origin_url: String,
    upstream_timeout: Duration,
    trust_proxy: bool,
    debug: bool,
    location_rewrite: Option<LocationRewrite>,
    scheduler: Arc<dyn PurgeScheduler>,
}

impl ProxyManager {
    pub fn new(config: &ProxyConfig, scheduler: Arc<dyn PurgeScheduler>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.timeouts.connect)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let location_rewrite = config
            .public_url
            .as_deref()
            .map(|public| LocationRewrite::new(&config.origin_url, public));

        Ok(Self {
            client,
            origin_url: config.origin_url.trim_end_matches('/').to_string(),
            upstream_timeout: config.timeouts.upstream,
            trust_proxy: config.security.trust_proxy,
            debug: config.debug,
            location_rewrite,
            scheduler,
        })
    }

    fn target_url(&self, path_and_query: &str) -> Result<Url, ProxyError> {
        let target = format!("{}{}", self.origin_url, path_and_query);
        Url::parse(&target).map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", target, e)))
    }

    /// Forward a buffered request to the origin and relay its response.
    pub async fn forward(&self, parts: Parts, body: Bytes, peer: SocketAddr) -> Result<Response, ProxyError> {
        let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let target = self.target_url(path_and_query)?;

        let mut headers = parts.headers;
        let ip = client_ip(&headers, peer, self.trust_proxy);
        prepare_origin_headers(&mut headers, &ip);

        tracing::info!(method = %parts.method, path = path_and_query, client_ip = %ip, "Proxying request");
        if self.debug {
            tracing::debug!(headers = ?headers, "Origin request headers");
        }

        let mut request = self.client.request(parts.method.clone(), target).headers(headers);
        if !body.is_empty() {
            request = request.body(body);
        }

        let mut response = match tokio::time::timeout(self.upstream_timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProxyError::OriginUnavailable(e)),
            Err(_) => return Err(ProxyError::OriginTimeout(self.upstream_timeout)),
        };

        let status = response.status();
        let mut headers = std::mem::take(response.headers_mut());
        strip_hop_by_hop(&mut headers);
        if let Some(rewrite) = &self.location_rewrite {
            rewrite.apply(&mut headers);
        }

        tracing::info!(status = status.as_u16(), method = %parts.method, path = path_and_query, "Origin responded");
        if self.debug {
            tracing::debug!(headers = ?headers, "Origin response headers");
        }

        let stream: BodyStream = Box::pin(response.bytes_stream());
        let body = if headers.contains_key(X_CACHE_INVALIDATE) {
            Body::from_stream(InvalidateOnEnd::new(stream, self.scheduler.clone()))
        } else {
            Body::from_stream(stream)
        };

        let mut relayed = Response::new(body);
        *relayed.status_mut() = status;
        *relayed.headers_mut() = headers;
        Ok(relayed)
    }
}

type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Body stream that requests a purge once it is done.
struct InvalidateOnEnd {
    inner: BodyStream,
    scheduler: Option<Arc<dyn PurgeScheduler>>,
}

impl InvalidateOnEnd {
    fn new(inner: BodyStream, scheduler: Arc<dyn PurgeScheduler>) -> Self {
        Self {
            inner,
            scheduler: Some(scheduler),
        }
    }

    fn fire(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            tracing::info!("Detected x-cache-invalidate header, scheduling cache purge");
            scheduler.schedule_debounced_purge();
        }
    }
}

impl Stream for InvalidateOnEnd {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(None) = polled {
            self.fire();
        }
        polled
    }
}

impl Drop for InvalidateOnEnd {
    fn drop(&mut self) {
        // Client went away or the body errored; the origin change still happened.
        self.fire();
    }
}
