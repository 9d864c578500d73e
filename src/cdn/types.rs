//! CDN wire types and error definitions.

use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use crate::resilience::Retryable;

/// Logical storage directory holding permanent-cache artifacts.
pub const PERMA_CACHE_DIR: &str = "__bcdn_perma_cache__";

/// Pull zone record. Only the display name is consumed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PullZone {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
}

/// One object returned by a storage listing call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FileDetail {
    pub object_name: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub last_changed: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
}

impl FileDetail {
    pub fn named(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
            length: 0,
            is_directory: false,
            path: None,
            last_changed: None,
            guid: None,
        }
    }
}

/// Errors from CDN control-plane and storage API calls.
#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// Connection, TLS, or timeout failure.
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote answered with a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The remote answered 2xx with a payload we could not use.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    /// The request could not be built from the given inputs.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Retryable for RemoteApiError {
    fn is_retryable(&self) -> bool {
        !matches!(self, RemoteApiError::InvalidRequest(_))
    }
}

/// The remote operations the cache manager depends on.
///
/// Implementations perform a single attempt; retries are applied by the
/// caller.
pub trait CdnApi: Send + Sync + 'static {
    /// Purge the pull zone's edge cache.
    fn purge_pull_zone_cache(
        &self,
        pull_zone_id: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<(), RemoteApiError>> + Send;

    /// Resolve the pull zone's display name.
    fn resolve_pull_zone_name(
        &self,
        pull_zone_id: &str,
        api_key: &str,
    ) -> impl Future<Output = Result<String, RemoteApiError>> + Send;

    /// List objects directly under `path_prefix` in a storage zone.
    fn list_storage_objects(
        &self,
        storage_zone: &str,
        path_prefix: &str,
        password: &str,
    ) -> impl Future<Output = Result<Vec<FileDetail>, RemoteApiError>> + Send;

    /// Delete one object under `path_prefix` in a storage zone.
    fn delete_storage_object(
        &self,
        storage_zone: &str,
        path_prefix: &str,
        object_name: &str,
        password: &str,
    ) -> impl Future<Output = Result<(), RemoteApiError>> + Send;
}
