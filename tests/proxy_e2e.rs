//! End-to-end tests: client → proxy → mock origin.

mod common;

use std::time::Duration;

use axum::http::{header, StatusCode};
use common::*;

use cms_edge_proxy::http::MAINTENANCE_HTML;

const MAGIC_LINK: &str = "/members/api/send-magic-link/";

#[tokio::test]
async fn test_spam_signature_is_blocked_before_origin() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;

    let response = client()
        .post(proxy.url(MAGIC_LINK))
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"name":"adwdasddwa","email":"bot@example.com","emailType":"signup"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text().await.unwrap(), "Forbidden");
    assert_eq!(recorder.len(), 0);
}

#[tokio::test]
async fn test_spam_filter_can_be_disabled() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &["--spam-block", "false"]).await;

    let response = client()
        .post(proxy.url(MAGIC_LINK))
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"name":"adwdasddwa"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_legitimate_signup_reaches_origin_unchanged() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;
    let body = r#"{"name":"Ada Lovelace","email":"ada@example.com","emailType":"signup"}"#;

    let response = client()
        .post(proxy.url(MAGIC_LINK))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), format!("origin:{}", MAGIC_LINK));

    let requests = recorder.all();
    assert_eq!(requests.len(), 1);
    assert_eq!(&requests[0].body[..], body.as_bytes());
    assert_eq!(requests[0].headers[header::CONTENT_LENGTH], body.len().to_string().as_str());
}

#[tokio::test]
async fn test_body_and_headers_relayed_byte_for_byte() {
    let (origin, _) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    let response = client()
        .post(proxy.url("/echo"))
        .header(header::CONTENT_TYPE, "application/x-binary")
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-binary");
    assert_eq!(response.bytes().await.unwrap().to_vec(), payload);

    let response = client().get(proxy.url("/about/")).send().await.unwrap();
    assert_eq!(response.headers()["x-origin"], "ghost");
    assert_eq!(response.text().await.unwrap(), "origin:/about/");
}

#[tokio::test]
async fn test_encoded_bodies_are_not_decoded() {
    let (origin, _) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;

    let response = client().get(proxy.url("/compressed")).send().await.unwrap();

    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "7");
    assert_eq!(
        response.bytes().await.unwrap().to_vec(),
        vec![0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03]
    );
}

#[tokio::test]
async fn test_forwarding_headers_use_trusted_client_ip() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;

    client()
        .get(proxy.url("/tag/news/?page=2"))
        .header("x-original-forwarded-for", "198.51.100.7")
        .header("x-forwarded-for", "6.6.6.6")
        .header(header::COOKIE, "ghost-members-ssr=abc")
        .send()
        .await
        .unwrap();

    let request = &recorder.all()[0];
    assert_eq!(request.uri, "/tag/news/?page=2");
    assert_eq!(request.headers["x-forwarded-for"], "198.51.100.7");
    assert_eq!(request.headers["x-real-ip"], "198.51.100.7");
    assert_eq!(request.headers["x-forwarded-proto"], "https");
    assert_eq!(request.headers["x-forwarded-host"], proxy.addr.to_string().as_str());
    assert_eq!(request.headers[header::HOST], origin.to_string().as_str());
    assert_eq!(request.headers[header::COOKIE], "ghost-members-ssr=abc");
}

#[tokio::test]
async fn test_untrusted_proxy_uses_peer_address() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &["--trust-proxy", "false"]).await;

    client()
        .get(proxy.url("/"))
        .header("x-original-forwarded-for", "198.51.100.7")
        .send()
        .await
        .unwrap();

    let request = &recorder.all()[0];
    assert_eq!(request.headers["x-forwarded-for"], "127.0.0.1");
    assert_eq!(request.headers["x-real-ip"], "127.0.0.1");
}

#[tokio::test]
async fn test_request_id_reaches_origin_and_client() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;

    let response = client().get(proxy.url("/")).send().await.unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(recorder.all()[0].headers["x-request-id"], id.as_str());

    let response = client()
        .get(proxy.url("/"))
        .header("x-request-id", "edge-123")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "edge-123");
}

#[tokio::test]
async fn test_origin_down_serves_maintenance_page() {
    let dead_origin = unused_addr().await;
    let (proxy, scheduler) = start_proxy_with_counter(dead_origin, &[]).await;

    let response = client().get(proxy.url("/any/page/")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(response.text().await.unwrap(), MAINTENANCE_HTML);
    assert_eq!(scheduler.count(), 0);
}

#[tokio::test]
async fn test_slow_origin_serves_maintenance_page() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &["--upstream-timeout-secs", "1"]).await;

    let started = std::time::Instant::now();
    let response = client().get(proxy.url("/slow")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().await.unwrap(), MAINTENANCE_HTML);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_invalidation_header_schedules_exactly_one_purge() {
    let (origin, _) = start_mock_origin().await;
    let (proxy, scheduler) = start_proxy_with_counter(origin, &[]).await;

    let response = client()
        .post(proxy.url("/ghost/api/admin/posts/"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"posts":[{"title":"Hello"}]}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-cache-invalidate"], "/*");
    assert_eq!(response.text().await.unwrap(), r#"{"posts":[]}"#);

    assert!(eventually(Duration::from_secs(2), || scheduler.count() == 1).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scheduler.count(), 1);
}

#[tokio::test]
async fn test_no_invalidation_header_schedules_nothing() {
    let (origin, _) = start_mock_origin().await;
    let (proxy, scheduler) = start_proxy_with_counter(origin, &[]).await;

    for path in ["/", "/about/", "/redirect"] {
        let response = client().get(proxy.url(path)).send().await.unwrap();
        let _ = response.bytes().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scheduler.count(), 0);
}

#[tokio::test]
async fn test_redirects_pass_through_unfollowed() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;

    let response = client().get(proxy.url("/redirect")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/target/");
    assert_eq!(recorder.len(), 1);
}

#[tokio::test]
async fn test_public_url_rewrites_origin_locations() {
    let (origin, _) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &["--public-url", "https://blog.example.com/"]).await;

    let response = client().get(proxy.url("/absolute-redirect")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://blog.example.com/signin/?r=1"
    );

    let response = client().get(proxy.url("/redirect")).send().await.unwrap();
    assert_eq!(response.headers()[header::LOCATION], "/target/");
}

#[tokio::test]
async fn test_repeated_slashes_redirect_before_origin() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &[]).await;

    let response = client().get(proxy.url("/blog//hello///?ref=x")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()[header::LOCATION], "/blog/hello/?ref=x");
    assert_eq!(recorder.len(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (origin, recorder) = start_mock_origin().await;
    let (proxy, _) = start_proxy_with_counter(origin, &["--max-body-bytes", "16"]).await;

    let response = client()
        .post(proxy.url("/echo"))
        .body(vec![b'x'; 64])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(recorder.len(), 0);
}
