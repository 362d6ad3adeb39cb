//! Login, registration and session lifetime against the fake backend.

use robostore_integration_tests::fake_backend::{CUSTOMER_EMAIL, CUSTOMER_PASSWORD};
use robostore_integration_tests::{TestApp, location};

// =============================================================================
// Login & Session Lifetime
// =============================================================================

#[tokio::test]
async fn test_login_session_persists_across_requests() {
    let app = TestApp::spawn().await;

    assert_eq!(app.login_customer().await, "/dashboard");

    let body = app.page("/dashboard").await;
    assert!(body.contains("Welcome back, ada!"));
    assert!(body.contains("Hello, ada"));

    // Still logged in on the next request; the flash was shown once.
    let body = app.page("/dashboard").await;
    assert!(body.contains("Hello, ada"));
    assert!(!body.contains("Welcome back"));
}

#[tokio::test]
async fn test_token_inside_expiry_margin_is_dropped() {
    let app = TestApp::spawn().await;
    // Shorter than the 300s early-expiry margin.
    app.backend.set_token_ttl(60);

    app.login_customer().await;

    let resp = app.get("/dashboard").await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/login?next=%2Fdashboard");
}

#[tokio::test]
async fn test_token_rejected_by_backend_ends_session() {
    let app = TestApp::spawn().await;
    app.login_customer().await;
    app.backend.revoke_tokens();

    let resp = app.get("/dashboard").await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/login");

    let body = app.page("/login").await;
    assert!(body.contains("Your session has expired, please log in again"));

    // The stale session is gone, not just this page.
    let resp = app.get("/dashboard").await;
    assert_eq!(location(&resp), "/login?next=%2Fdashboard");
}

#[tokio::test]
async fn test_login_returns_to_next() {
    let app = TestApp::spawn().await;
    let resp = app
        .post(
            "/login",
            &[
                ("email", CUSTOMER_EMAIL),
                ("password", CUSTOMER_PASSWORD),
                ("next", "/cart"),
            ],
        )
        .await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/cart");
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let app = TestApp::spawn().await;
    let resp = app
        .post(
            "/login",
            &[
                ("email", CUSTOMER_EMAIL),
                ("password", CUSTOMER_PASSWORD),
                ("next", "//evil.example"),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/dashboard");
}

#[tokio::test]
async fn test_bad_credentials_rerender_login() {
    let app = TestApp::spawn().await;
    let resp = app
        .post("/login", &[("email", CUSTOMER_EMAIL), ("password", "wrong-password")])
        .await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Invalid email or password"));
    assert!(body.contains(CUSTOMER_EMAIL));

    let resp = app.get("/dashboard").await;
    assert_eq!(resp.status(), 303);
}

#[tokio::test]
async fn test_anonymous_dashboard_redirects_to_login() {
    let app = TestApp::spawn().await;
    let resp = app.get("/dashboard?page=2").await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/login?next=%2Fdashboard%3Fpage%3D2");
}

#[tokio::test]
async fn test_logged_in_login_page_redirects() {
    let app = TestApp::spawn().await;
    app.login_customer().await;
    let resp = app.get("/login").await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/dashboard");
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_logs_in() {
    let app = TestApp::spawn().await;
    let resp = app
        .post(
            "/register",
            &[
                ("username", "grace"),
                ("email", "grace@robots.io"),
                ("password", "hopper1"),
                ("password_confirm", "hopper1"),
            ],
        )
        .await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/dashboard");

    let body = app.page("/dashboard").await;
    assert!(body.contains("Your account has been created"));
    assert!(body.contains("Hello, grace"));
}

#[tokio::test]
async fn test_register_password_mismatch_skips_backend() {
    let app = TestApp::spawn().await;
    let resp = app
        .post(
            "/register",
            &[
                ("username", "grace"),
                ("email", "grace@robots.io"),
                ("password", "hopper1"),
                ("password_confirm", "hopper2"),
            ],
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert!(!app.backend.calls().iter().any(|call| call.contains("/api/auth/register")));
}

#[tokio::test]
async fn test_register_duplicate_email_shows_backend_message() {
    let app = TestApp::spawn().await;
    let resp = app
        .post(
            "/register",
            &[
                ("username", "ada2"),
                ("email", CUSTOMER_EMAIL),
                ("password", "secret1"),
                ("password_confirm", "secret1"),
            ],
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("Email already registered"));
}

// =============================================================================
// Profile
// =============================================================================

#[tokio::test]
async fn test_profile_update_refreshes_session_user() {
    let app = TestApp::spawn().await;
    app.login_customer().await;

    let resp = app
        .post(
            "/profile/edit",
            &[("username", "ada_l"), ("email", CUSTOMER_EMAIL)],
        )
        .await;
    assert_eq!(resp.status(), 303);
    assert_eq!(location(&resp), "/dashboard");

    let body = app.page("/dashboard").await;
    assert!(body.contains("Profile updated"));
    assert!(body.contains("Hello, ada_l"));
}
