//! End-to-end tests for the Robostore storefront.
//!
//! Each test spawns a [`FakeBackend`] and a storefront wired to it, both on
//! ephemeral ports, then drives the storefront over HTTP with a cookie-keeping
//! client that does not follow redirects.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_health() {
//!     let app = TestApp::spawn().await;
//!     let resp = app.get("/health").await;
//!     assert_eq!(resp.status(), 200);
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fake_backend;

use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};

use robostore_storefront::config::StorefrontConfig;
use robostore_storefront::state::AppState;

pub use fake_backend::FakeBackend;

/// A storefront served against a fresh fake backend.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub backend: FakeBackend,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let backend = FakeBackend::spawn().await;
        let config = StorefrontConfig::for_backend(backend.url().clone());
        let state = AppState::new(config).expect("Failed to build app state");
        let app = robostore_storefront::app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind storefront");
        let addr = listener.local_addr().expect("Storefront has no address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Storefront stopped");
        });

        Self {
            base_url: format!("http://{addr}"),
            client: Self::new_client(),
            backend,
        }
    }

    /// A client with its own cookie jar, for a second visitor.
    #[must_use]
    pub fn new_client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("GET failed")
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.client
            .post(format!("{}{path}", self.base_url))
            .form(form)
            .send()
            .await
            .expect("POST failed")
    }

    /// Body of `GET path`, asserting it rendered.
    pub async fn page(&self, path: &str) -> String {
        let resp = self.get(path).await;
        assert_eq!(resp.status(), 200, "GET {path} did not render");
        resp.text().await.expect("Unreadable body")
    }

    /// Log in and return where the storefront redirected.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .post("/login", &[("email", email), ("password", password)])
            .await;
        assert_eq!(resp.status(), 303, "login for {email} was not accepted");
        location(&resp)
    }

    pub async fn login_customer(&self) -> String {
        self.login(fake_backend::CUSTOMER_EMAIL, fake_backend::CUSTOMER_PASSWORD)
            .await
    }

    pub async fn login_admin(&self) -> String {
        self.login(fake_backend::ADMIN_EMAIL, fake_backend::ADMIN_PASSWORD)
            .await
    }

    pub async fn logout(&self) {
        let resp = self.post("/logout", &[]).await;
        assert_eq!(resp.status(), 303);
    }

    /// Header badge count from `/cart/count`.
    pub async fn cart_count(&self) -> u64 {
        let body = self.page("/cart/count").await;
        let digits: String = body.chars().filter(char::is_ascii_digit).collect();
        digits.parse().expect("Cart count fragment has no number")
    }
}

/// `Location` header of a redirect.
#[must_use]
pub fn location(resp: &Response) -> String {
    resp.headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
