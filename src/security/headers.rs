//! Header hygiene across the proxy boundary.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Derive the client IP for X-Forwarded-For / X-Real-IP
//! - Add forwarding headers to origin requests
//!
//! # Design Decisions
//! - Client-supplied X-Forwarded-For is never trusted; only
//!   X-Original-Forwarded-For set by a trusted upstream layer is
//! - Bodies are relayed raw, so content-encoding and content-length are
//!   end-to-end and pass through; framing headers do not

use std::net::SocketAddr;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

pub const X_ORIGINAL_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-original-forwarded-for");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Headers that describe a single connection, not the message.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    KEEP_ALIVE,
    PROXY_CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Client address to report to the origin.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get(X_ORIGINAL_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }
    peer.ip().to_canonical().to_string()
}

/// Prepare inbound request headers for the origin.
///
/// `host` is dropped so the client sets the origin's own host, and
/// `content-length` is dropped because the buffered body is re-sent with
/// its own length.
pub fn prepare_origin_headers(headers: &mut HeaderMap, client_ip: &str) {
    let inbound_host = headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    strip_hop_by_hop(headers);

    match HeaderValue::from_str(client_ip) {
        Ok(ip) => {
            headers.insert(X_FORWARDED_FOR, ip.clone());
            headers.insert(X_REAL_IP, ip);
        }
        Err(_) => {
            tracing::warn!(client_ip, "Client IP is not a valid header value, not forwarding it");
            headers.remove(X_FORWARDED_FOR);
            headers.remove(X_REAL_IP);
        }
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
    if let Some(host) = inbound_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
}
