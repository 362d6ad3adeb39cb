//! Liveness and the response headers every page carries.

use robostore_integration_tests::TestApp;

#[tokio::test]
async fn test_health_does_not_call_backend() {
    let app = TestApp::spawn().await;
    let resp = app.get("/health").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn test_pages_carry_security_headers_and_request_id() {
    let app = TestApp::spawn().await;
    let resp = app.get("/store").await;
    assert_eq!(resp.status(), 200);

    let headers = resp.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["cache-control"], "no-store, max-age=0");
    assert!(headers.contains_key("content-security-policy"));
    assert!(!headers["x-request-id"].is_empty());
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let app = TestApp::spawn().await;
    let resp = app
        .client
        .get(format!("{}/health", app.base_url))
        .header("x-request-id", "probe-42")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-request-id"], "probe-42");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::spawn().await;
    let resp = app.get("/no-such-page").await;
    assert_eq!(resp.status(), 404);
}
