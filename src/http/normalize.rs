//! Path normalization.
//!
//! Paths with repeated slashes (`//blog///post/`) are redirected to their
//! collapsed form before any other handling. The query string is kept.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Collapse runs of `/` into one. Returns `None` when nothing changes.
pub fn collapse_slashes(path: &str) -> Option<String> {
    if !path.contains("//") {
        return None;
    }
    let mut collapsed = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        collapsed.push(c);
    }
    Some(collapsed)
}

fn normalized_location(uri: &Uri) -> Option<String> {
    let path = collapse_slashes(uri.path())?;
    Some(match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    })
}

/// Middleware answering non-canonical paths with 301.
pub async fn normalize_path(request: Request, next: Next) -> Response {
    let Some(location) = normalized_location(request.uri()) else {
        return next.run(request).await;
    };

    tracing::debug!(from = %request.uri(), to = %location, "Redirecting to normalized path");
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
