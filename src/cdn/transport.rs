//! Pooled outbound transport for CDN and storage API calls.
//!
//! One `reqwest::Client` is built at startup and shared for the process
//! lifetime. Idle connections are kept per scheme and authority, so the
//! control plane and the storage API each keep their own warm TLS
//! connections. Certificates are always verified on this path.

use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use url::Url;

use crate::cdn::types::RemoteApiError;
use crate::config::TimeoutConfig;

const ACCESS_KEY: &str = "AccessKey";

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions<'a> {
    pub method: Method,
    /// Value for the `AccessKey` header.
    pub access_key: &'a str,
    /// Send `content-type: application/json`.
    pub json_body: bool,
}

impl<'a> RequestOptions<'a> {
    pub fn new(method: Method, access_key: &'a str) -> Self {
        Self {
            method,
            access_key,
            json_body: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_body = true;
        self
    }
}

/// Keep-alive HTTP client shared by all remote API calls.
#[derive(Debug, Clone)]
pub struct PooledTransport {
    client: Client,
}

impl PooledTransport {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.remote_api)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(32)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }

    /// Send one request. Any status is returned as-is; only transport
    /// failures become errors here.
    pub async fn request(&self, url: Url, options: RequestOptions<'_>) -> Result<Response, RemoteApiError> {
        let access_key = HeaderValue::from_str(options.access_key)
            .map_err(|_| RemoteApiError::InvalidRequest("access key is not a valid header value".into()))?;
        let endpoint = url.to_string();

        let mut request = self
            .client
            .request(options.method, url)
            .header(ACCEPT, "application/json")
            .header(ACCESS_KEY, access_key);
        if options.json_body {
            request = request.header(CONTENT_TYPE, "application/json");
        }

        request
            .send()
            .await
            .map_err(|source| RemoteApiError::Transport { endpoint, source })
    }
}
