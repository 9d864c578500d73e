//! Shared mock servers for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use cms_edge_proxy::config::{ConfigArgs, ProxyConfig};
use cms_edge_proxy::{HttpServer, PurgeScheduler, Shutdown};

pub const STORAGE_ZONE: &str = "site-storage";
pub const PULL_ZONE_ID: &str = "42";
pub const PULL_ZONE_NAME: &str = "my-site";
pub const API_KEY: &str = "test-api-key";
pub const STORAGE_PASSWORD: &str = "storage-password";

/// A request as seen by a mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Thread-safe log of received requests.
#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<RecordedRequest>>>);

impl Recorder {
    fn push(&self, request: RecordedRequest) {
        self.0.lock().unwrap().push(request);
    }

    pub fn all(&self) -> Vec<RecordedRequest> {
        self.0.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn matching(&self, method: Method, path_prefix: &str) -> Vec<RecordedRequest> {
        self.all()
            .into_iter()
            .filter(|r| r.method == method && r.uri.starts_with(path_prefix))
            .collect()
    }
}

async fn record(recorder: &Recorder, request: Request) -> RecordedRequest {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let recorded = RecordedRequest {
        method: parts.method,
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body,
    };
    recorder.push(recorded.clone());
    recorded
}

/// Bind a router on an ephemeral local port.
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Bound address that nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a mock Ghost origin.
///
/// - `/echo` returns the request body with its content type
/// - `/ghost/api/admin/posts/` answers with `x-cache-invalidate`
/// - `/slow` answers after five seconds
/// - `/redirect` answers 302 to `/target/`
/// - `/absolute-redirect` answers 301 to an absolute URL on the origin host
/// - `/compressed` returns gzip-labelled bytes
/// - anything else returns `origin:<path>`
pub async fn start_mock_origin() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let router = Router::new().fallback(origin_handler).with_state(recorder.clone());
    (spawn_router(router).await, recorder)
}

async fn origin_handler(State(recorder): State<Recorder>, request: Request) -> Response {
    let recorded = record(&recorder, request).await;
    let path = recorded.uri.split('?').next().unwrap_or("/").to_string();

    match path.as_str() {
        "/echo" => {
            let content_type = recorded
                .headers
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| header::HeaderValue::from_static("application/octet-stream"));
            ([(header::CONTENT_TYPE, content_type)], recorded.body).into_response()
        }
        "/ghost/api/admin/posts/" => (
            StatusCode::CREATED,
            [("x-cache-invalidate", "/*"), ("content-type", "application/json")],
            r#"{"posts":[]}"#,
        )
            .into_response(),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late".into_response()
        }
        "/redirect" => (StatusCode::FOUND, [(header::LOCATION, "/target/")]).into_response(),
        "/absolute-redirect" => {
            let host = recorded
                .headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            let location = format!("http://{}/signin/?r=1", host);
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
        }
        "/compressed" => (
            [(header::CONTENT_ENCODING, "gzip")],
            Bytes::from_static(&[0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03]),
        )
            .into_response(),
        _ => ([("x-origin", "ghost")], format!("origin:{}", path)).into_response(),
    }
}

/// Start a mock CDN control-plane API.
///
/// - `POST /pullzone/{id}/purgeCache` returns 204
/// - `GET /pullzone/42/` returns the zone record; `/pullzone/7/` lacks a Name
/// - `/pullzone/500/...` always fails with 500
pub async fn start_mock_cdn_api() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let router = Router::new()
        .route("/pullzone/{id}/purgeCache", post(purge_handler))
        .route("/pullzone/{id}/", get(pull_zone_handler))
        .with_state(recorder.clone());
    (spawn_router(router).await, recorder)
}

async fn purge_handler(
    State(recorder): State<Recorder>,
    Path(id): Path<String>,
    request: Request,
) -> StatusCode {
    record(&recorder, request).await;
    if id == "500" {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn pull_zone_handler(
    State(recorder): State<Recorder>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    record(&recorder, request).await;
    match id.as_str() {
        PULL_ZONE_ID => Json(json!({ "Id": 42, "Name": PULL_ZONE_NAME, "Enabled": true })).into_response(),
        "7" => Json(json!({ "Id": 7 })).into_response(),
        _ => (StatusCode::NOT_FOUND, "pull zone not found").into_response(),
    }
}

/// Mock storage zone contents, shared with the handlers.
#[derive(Debug, Clone, Default)]
pub struct StorageState {
    pub objects: Arc<Mutex<Vec<String>>>,
    pub recorder: Recorder,
}

impl StorageState {
    pub fn remaining(&self) -> Vec<String> {
        self.objects.lock().unwrap().clone()
    }
}

/// Start a mock storage API.
///
/// - `GET /{STORAGE_ZONE}/__bcdn_perma_cache__/` lists `objects`
/// - `GET /odd-zone/...` returns an object, `/broken-zone/...` a 500,
///   `/garbage-zone/...` a non-JSON body
/// - `DELETE /{zone}/__bcdn_perma_cache__/{name}/` removes `name`, 404 if absent
pub async fn start_mock_storage(objects: &[&str]) -> (SocketAddr, StorageState) {
    let state = StorageState {
        objects: Arc::new(Mutex::new(objects.iter().map(|s| s.to_string()).collect())),
        recorder: Recorder::default(),
    };
    let router = Router::new()
        .route("/{zone}/__bcdn_perma_cache__/", get(list_handler))
        .route("/{zone}/__bcdn_perma_cache__/{name}/", delete(delete_handler))
        .with_state(state.clone());
    (spawn_router(router).await, state)
}

async fn list_handler(
    State(state): State<StorageState>,
    Path(zone): Path<String>,
    request: Request,
) -> Response {
    record(&state.recorder, request).await;
    match zone.as_str() {
        "odd-zone" => Json(json!({ "HttpCode": 404, "Message": "not found" })).into_response(),
        "broken-zone" => (StatusCode::INTERNAL_SERVER_ERROR, "storage exploded").into_response(),
        "garbage-zone" => (StatusCode::OK, "<html>nope</html>").into_response(),
        _ => {
            let listing: Vec<_> = state
                .remaining()
                .into_iter()
                .map(|name| {
                    json!({
                        "Guid": format!("guid-{}", name),
                        "ObjectName": name,
                        "Path": format!("/{}/__bcdn_perma_cache__/", zone),
                        "Length": 0,
                        "IsDirectory": true,
                    })
                })
                .collect();
            Json(listing).into_response()
        }
    }
}

async fn delete_handler(
    State(state): State<StorageState>,
    Path((_zone, name)): Path<(String, String)>,
    request: Request,
) -> Response {
    record(&state.recorder, request).await;
    let mut objects = state.objects.lock().unwrap();
    match objects.iter().position(|o| *o == name) {
        Some(index) => {
            objects.remove(index);
            Json(json!({ "HttpCode": 200, "Message": "File deleted successfuly." })).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "HttpCode": 404 }))).into_response(),
    }
}

/// Scheduler that only counts invocations.
#[derive(Debug, Default)]
pub struct CountingScheduler(AtomicUsize);

impl CountingScheduler {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl PurgeScheduler for CountingScheduler {
    fn schedule_debounced_purge(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Configuration pointing at mock servers.
pub fn proxy_config(origin: SocketAddr, api: SocketAddr, storage: SocketAddr, extra: &[&str]) -> ProxyConfig {
    let mut args: Vec<String> = vec![
        "cms-edge-proxy".into(),
        "--origin-url".into(),
        format!("http://{}", origin),
        "--bunny-api-key".into(),
        API_KEY.into(),
        "--bunny-pull-zone-id".into(),
        PULL_ZONE_ID.into(),
        "--bunny-api-url".into(),
        format!("http://{}", api),
        "--bunny-storage-url".into(),
        format!("http://{}", storage),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    ConfigArgs::try_parse_from(args).unwrap().into_config().unwrap()
}

/// A running proxy; stops when dropped.
pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(server: HttpServer) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let notified = shutdown.notified();
    tokio::spawn(async move {
        server.run(listener, notified).await.unwrap();
    });
    TestProxy {
        addr,
        shutdown,
    }
}

/// Proxy in front of `origin` with a counting scheduler.
pub async fn start_proxy_with_counter(
    origin: SocketAddr,
    extra: &[&str],
) -> (TestProxy, Arc<CountingScheduler>) {
    let unused = unused_addr().await;
    let config = proxy_config(origin, unused, unused, extra);
    let scheduler = Arc::new(CountingScheduler::default());
    let server = HttpServer::with_scheduler(config, scheduler.clone()).unwrap();
    (start_proxy(server).await, scheduler)
}

/// HTTP client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
