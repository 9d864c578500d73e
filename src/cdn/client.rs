//! CDN control-plane and storage API client.
//!
//! # Responsibilities
//! - Purge a pull zone's edge cache
//! - Resolve a pull zone's display name
//! - List and delete storage-zone objects
//!
//! # Design Decisions
//! - One attempt per call; the cache manager wraps calls in retries
//! - Path segments are percent-encoded by `url`, never concatenated
//! - A listing payload that is not an array decodes as empty

use reqwest::{Method, Response};
use serde_json::Value;
use url::Url;

use crate::cdn::transport::{PooledTransport, RequestOptions};
use crate::cdn::types::{CdnApi, FileDetail, PullZone, RemoteApiError};
use crate::config::BunnyConfig;

/// Upper bound on error body text kept in a `RemoteApiError`.
const MAX_ERROR_BODY: usize = 512;

/// Client for the CDN control plane and storage API.
#[derive(Debug, Clone)]
pub struct CdnClient {
    transport: PooledTransport,
    api_base: Url,
    storage_base: Url,
}

impl CdnClient {
    pub fn new(transport: PooledTransport, api_base: Url, storage_base: Url) -> Self {
        Self {
            transport,
            api_base,
            storage_base,
        }
    }

    /// Build a client for the configured endpoints.
    pub fn from_config(transport: PooledTransport, config: &BunnyConfig) -> Result<Self, RemoteApiError> {
        let api_base = Url::parse(&config.api_base_url)
            .map_err(|e| RemoteApiError::InvalidRequest(format!("invalid API base URL: {}", e)))?;
        let storage_base = Url::parse(&config.storage_base_url)
            .map_err(|e| RemoteApiError::InvalidRequest(format!("invalid storage base URL: {}", e)))?;
        Ok(Self::new(transport, api_base, storage_base))
    }

    fn pull_zone_url(&self, pull_zone_id: &str, action: &str) -> Result<Url, RemoteApiError> {
        require("pull zone id", pull_zone_id)?;
        join_segments(&self.api_base, ["pullzone", pull_zone_id, action])
    }

    fn storage_url(
        &self,
        storage_zone: &str,
        path_prefix: &str,
        object_name: Option<&str>,
    ) -> Result<Url, RemoteApiError> {
        require("storage zone", storage_zone)?;
        let mut segments = vec![storage_zone];
        segments.extend(path_prefix.split('/').filter(|s| !s.is_empty()));
        if let Some(name) = object_name {
            require("object name", name)?;
            segments.push(name);
        }
        // Trailing slash, as the storage API expects for both calls.
        segments.push("");
        join_segments(&self.storage_base, segments)
    }
}

impl CdnApi for CdnClient {
    async fn purge_pull_zone_cache(&self, pull_zone_id: &str, api_key: &str) -> Result<(), RemoteApiError> {
        let url = self.pull_zone_url(pull_zone_id, "purgeCache")?;
        let endpoint = url.to_string();
        let response = self
            .transport
            .request(url, RequestOptions::new(Method::POST, api_key).json())
            .await?;
        ensure_success(response, &endpoint).await?;
        Ok(())
    }

    async fn resolve_pull_zone_name(&self, pull_zone_id: &str, api_key: &str) -> Result<String, RemoteApiError> {
        let url = self.pull_zone_url(pull_zone_id, "")?;
        let endpoint = url.to_string();
        let response = self
            .transport
            .request(url, RequestOptions::new(Method::GET, api_key))
            .await?;
        let response = ensure_success(response, &endpoint).await?;

        let zone: PullZone = response.json().await.map_err(|e| RemoteApiError::Malformed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        if zone.name.trim().is_empty() {
            return Err(RemoteApiError::Malformed {
                endpoint,
                reason: "pull zone record has an empty Name".into(),
            });
        }
        Ok(zone.name)
    }

    async fn list_storage_objects(
        &self,
        storage_zone: &str,
        path_prefix: &str,
        password: &str,
    ) -> Result<Vec<FileDetail>, RemoteApiError> {
        let url = self.storage_url(storage_zone, path_prefix, None)?;
        let endpoint = url.to_string();
        let response = self
            .transport
            .request(url, RequestOptions::new(Method::GET, password))
            .await?;
        let response = ensure_success(response, &endpoint).await?;

        let text = response.text().await.map_err(|source| RemoteApiError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;
        let payload: Value = serde_json::from_str(&text).map_err(|e| RemoteApiError::Malformed {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(decode_listing(payload, &endpoint))
    }

    async fn delete_storage_object(
        &self,
        storage_zone: &str,
        path_prefix: &str,
        object_name: &str,
        password: &str,
    ) -> Result<(), RemoteApiError> {
        let url = self.storage_url(storage_zone, path_prefix, Some(object_name))?;
        let endpoint = url.to_string();
        let response = self
            .transport
            .request(url, RequestOptions::new(Method::DELETE, password))
            .await?;
        ensure_success(response, &endpoint).await?;
        Ok(())
    }
}

/// Decode a listing payload, tolerating non-array payloads and entries
/// without an `ObjectName`.
fn decode_listing(payload: Value, endpoint: &str) -> Vec<FileDetail> {
    let Value::Array(items) = payload else {
        tracing::warn!(endpoint, "Storage listing is not an array, treating as empty");
        return Vec::new();
    };

    let total = items.len();
    let files: Vec<FileDetail> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if files.len() < total {
        tracing::warn!(
            endpoint,
            skipped = total - files.len(),
            "Skipped storage entries without a usable ObjectName"
        );
    }
    files
}

async fn ensure_success(response: Response, endpoint: &str) -> Result<Response, RemoteApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    Err(RemoteApiError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}

fn require(what: &str, value: &str) -> Result<(), RemoteApiError> {
    if value.trim().is_empty() {
        return Err(RemoteApiError::InvalidRequest(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn join_segments<'s>(base: &Url, segments: impl IntoIterator<Item = &'s str>) -> Result<Url, RemoteApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteApiError::InvalidRequest(format!("{} cannot be a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
