//! Response handling and transformation.
//!
//! # Responsibilities
//! - Map origin failures to the maintenance page
//! - Rewrite redirect targets that leak the origin address
//!
//! # Design Decisions
//! - Clients never see a raw transport error, only 503 + maintenance HTML
//! - Location rewriting is a pure transform, applied only with PUBLIC_URL

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

/// Body served whenever the origin cannot be reached.
pub const MAINTENANCE_HTML: &str = include_str!("maintenance.html");

/// Failures while forwarding a request to the origin.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("origin unavailable: {0}")]
    OriginUnavailable(#[source] reqwest::Error),

    #[error("origin did not respond within {0:?}")]
    OriginTimeout(std::time::Duration),

    #[error("invalid origin target: {0}")]
    InvalidTarget(String),
}

impl ProxyError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::OriginUnavailable(_) => "unavailable",
            ProxyError::OriginTimeout(_) => "timeout",
            ProxyError::InvalidTarget(_) => "invalid_target",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        maintenance_response()
    }
}

pub fn maintenance_response() -> Response {
    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Html(MAINTENANCE_HTML)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Rewrites absolute `Location` values on the origin base to the public base.
#[derive(Debug, Clone)]
pub struct LocationRewrite {
    origin_base: String,
    public_base: String,
}

impl LocationRewrite {
    pub fn new(origin_base: &str, public_base: &str) -> Self {
        Self {
            origin_base: origin_base.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// New location, if `location` points into the origin.
    pub fn rewrite(&self, location: &str) -> Option<String> {
        let rest = location.strip_prefix(&self.origin_base)?;
        if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
            return None;
        }
        Some(format!("{}{}", self.public_base, rest))
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        let rewritten = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| self.rewrite(location))
            .and_then(|location| HeaderValue::from_str(&location).ok());
        if let Some(value) = rewritten {
            headers.insert(header::LOCATION, value);
        }
    }
}
