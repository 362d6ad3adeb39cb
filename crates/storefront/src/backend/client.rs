use std::sync::Arc;

use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::instrument;

use robostore_core::{
    Cart, CartItemId, Order, OrderId, OrderStatus, Product, ProductId, Role, StockMovement, User,
    UserId,
};

use super::BackendError;
use super::types::{
    AccessToken, AddToCart, AdminStats, AuthResponse, CartPayload, LoginRequest, LowStockReport,
    NewOrder, NewProduct, OrderQuery, OrderStats, Page, PageQuery, ProductQuery, ProfileUpdate,
    QuantityUpdate, RegisterRequest, RoleUpdate, StatusUpdate, StockAdjustment, StockUpdate,
    ThresholdQuery, decode_maybe_wrapped,
};
use crate::config::BackendConfig;

// =============================================================================
// Backend Client
// =============================================================================

/// Client for the store backend REST API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. TLS setup fails).
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("Robostore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.api_url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request plumbing
    // ─────────────────────────────────────────────────────────────────────────

    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self.inner.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    /// Send a request and return the raw JSON body of a success response.
    async fn send_value(&self, request: RequestBuilder) -> Result<serde_json::Value, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = BackendError::from_response(status, &body);
            tracing::debug!(%status, error = %err, "Backend request rejected");
            return Err(err);
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let value = self.send_value(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a request whose success body is irrelevant (`{"message": ...}`).
    async fn send_discard(&self, request: RequestBuilder) -> Result<(), BackendError> {
        self.send_value(request).await.map(drop)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for bad credentials, or any transport error.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let request = self
            .request(Method::POST, "/api/auth/login", None)
            .json(&LoginRequest { email, password });
        self.send(request).await
    }

    /// Create an account; the response logs the new user in.
    ///
    /// # Errors
    ///
    /// Returns an `Api` error when the username or email is taken.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, BackendError> {
        let request = self
            .request(Method::POST, "/api/auth/register", None)
            .json(&RegisterRequest {
                username,
                email,
                password,
            });
        self.send(request).await
    }

    /// Update the caller's username, email and optionally password.
    ///
    /// # Errors
    ///
    /// Returns an `Api` error when the current password is wrong or the
    /// username/email is taken.
    #[instrument(skip_all)]
    pub async fn update_profile(
        &self,
        token: &AccessToken,
        update: &ProfileUpdate,
    ) -> Result<User, BackendError> {
        let request = self
            .request(Method::PUT, "/api/users/profile", Some(token))
            .json(update);
        let value = self.send_value(request).await?;
        Ok(decode_maybe_wrapped(value, "user")?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Products & inventory
    // ─────────────────────────────────────────────────────────────────────────

    /// List products, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn list_products(
        &self,
        query: &ProductQuery,
        token: Option<&AccessToken>,
    ) -> Result<Page<Product>, BackendError> {
        let request = self.request(Method::GET, "/api/products/", token).query(query);
        self.send(request).await
    }

    /// Fetch a single product.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, BackendError> {
        let path = format!("/api/products/{}", urlencoding::encode(id.as_str()));
        let value = self.send_value(self.request(Method::GET, &path, None)).await?;
        Ok(decode_maybe_wrapped(value, "product")?)
    }

    /// Create a product (admin).
    ///
    /// # Errors
    ///
    /// Returns an `Api` error if the id already exists or fields are invalid.
    #[instrument(skip(self, token), fields(product_id = %product.id))]
    pub async fn create_product(
        &self,
        token: &AccessToken,
        product: &NewProduct,
    ) -> Result<Product, BackendError> {
        let request = self
            .request(Method::POST, "/api/products/", Some(token))
            .json(product);
        let value = self.send_value(request).await?;
        Ok(decode_maybe_wrapped(value, "product")?)
    }

    /// Apply a signed stock delta to a product (admin).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown product.
    #[instrument(skip(self, token))]
    pub async fn adjust_stock(
        &self,
        token: &AccessToken,
        id: &ProductId,
        adjustment: &StockAdjustment,
    ) -> Result<StockUpdate, BackendError> {
        let path = format!("/api/products/{}/stock", urlencoding::encode(id.as_str()));
        let request = self
            .request(Method::PUT, &path, Some(token))
            .json(adjustment);
        self.send(request).await
    }

    /// Inventory ledger for a product (admin).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown product.
    #[instrument(skip(self, token))]
    pub async fn stock_movements(
        &self,
        token: &AccessToken,
        id: &ProductId,
        page: u32,
    ) -> Result<Page<StockMovement>, BackendError> {
        let path = format!(
            "/api/products/{}/stock/movements",
            urlencoding::encode(id.as_str())
        );
        let request = self
            .request(Method::GET, &path, Some(token))
            .query(&PageQuery { page });
        self.send(request).await
    }

    /// Products at or below `threshold` units (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn low_stock(
        &self,
        token: &AccessToken,
        threshold: i64,
    ) -> Result<LowStockReport, BackendError> {
        let request = self
            .request(Method::GET, "/api/products/low-stock", Some(token))
            .query(&ThresholdQuery { threshold });
        self.send(request).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cart
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the token is rejected.
    #[instrument(skip_all)]
    pub async fn get_cart(&self, token: &AccessToken) -> Result<Cart, BackendError> {
        let payload: CartPayload = self
            .send(self.request(Method::GET, "/api/cart/", Some(token)))
            .await?;
        Ok(payload.into())
    }

    /// Add a product to the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token), fields(product_id = %item.product_id))]
    pub async fn add_to_cart(&self, token: &AccessToken, item: &AddToCart) -> Result<(), BackendError> {
        let request = self
            .request(Method::POST, "/api/cart/add", Some(token))
            .json(item);
        self.send_discard(request).await
    }

    /// Set a cart line's quantity. The backend rejects zero.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not belong to the caller.
    #[instrument(skip(self, token))]
    pub async fn update_cart_item(
        &self,
        token: &AccessToken,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::PUT, &format!("/api/cart/update/{id}"), Some(token))
            .json(&QuantityUpdate { quantity });
        self.send_discard(request).await
    }

    /// Remove a cart line.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the line does not belong to the caller.
    #[instrument(skip(self, token))]
    pub async fn remove_cart_item(&self, token: &AccessToken, id: CartItemId) -> Result<(), BackendError> {
        let request = self.request(Method::DELETE, &format!("/api/cart/remove/{id}"), Some(token));
        self.send_discard(request).await
    }

    /// Empty the caller's cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip_all)]
    pub async fn clear_cart(&self, token: &AccessToken) -> Result<(), BackendError> {
        self.send_discard(self.request(Method::DELETE, "/api/cart/clear", Some(token)))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// Turn the caller's cart into an order. The backend empties the cart.
    ///
    /// # Errors
    ///
    /// Returns an `Api` error for an empty cart or insufficient stock.
    #[instrument(skip_all)]
    pub async fn create_order(&self, token: &AccessToken, order: &NewOrder) -> Result<Order, BackendError> {
        let request = self
            .request(Method::POST, "/api/orders/", Some(token))
            .json(order);
        let value = self.send_value(request).await?;
        Ok(decode_maybe_wrapped(value, "order")?)
    }

    /// List orders. Consumers see their own; admins see everyone's.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, token))]
    pub async fn list_orders(&self, token: &AccessToken, query: &OrderQuery) -> Result<Page<Order>, BackendError> {
        let request = self
            .request(Method::GET, "/api/orders/", Some(token))
            .query(query);
        self.send(request).await
    }

    /// Move an order to a new status (admin).
    ///
    /// # Errors
    ///
    /// Returns an `Api` error if the backend refuses the transition.
    #[instrument(skip(self, token))]
    pub async fn update_order_status(
        &self,
        token: &AccessToken,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        let request = self
            .request(Method::PUT, &format!("/api/orders/{id}/status"), Some(token))
            .json(&StatusUpdate { status });
        self.send_discard(request).await
    }

    /// Order counts by status, revenue and recent orders (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin tokens.
    #[instrument(skip_all)]
    pub async fn order_stats(&self, token: &AccessToken) -> Result<OrderStats, BackendError> {
        self.send(self.request(Method::GET, "/api/orders/stats", Some(token)))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Admin
    // ─────────────────────────────────────────────────────────────────────────

    /// Store-wide totals (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin tokens.
    #[instrument(skip_all)]
    pub async fn admin_stats(&self, token: &AccessToken) -> Result<AdminStats, BackendError> {
        self.send(self.request(Method::GET, "/api/admin/stats", Some(token)))
            .await
    }

    /// List accounts (admin).
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-admin tokens.
    #[instrument(skip(self, token))]
    pub async fn list_users(&self, token: &AccessToken, page: u32) -> Result<Page<User>, BackendError> {
        let request = self
            .request(Method::GET, "/api/admin/users", Some(token))
            .query(&PageQuery { page });
        self.send(request).await
    }

    /// Change an account's role (admin).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown user.
    #[instrument(skip(self, token))]
    pub async fn update_user_role(&self, token: &AccessToken, id: UserId, role: Role) -> Result<(), BackendError> {
        let request = self
            .request(Method::PUT, &format!("/api/admin/users/{id}/role"), Some(token))
            .json(&RoleUpdate { role });
        self.send_discard(request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Json, Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, post, put};
    use axum::{Router, response::IntoResponse};
    use serde_json::json;
    use url::Url;

    use super::*;

    /// Serve `router` on an ephemeral port and return a client pointed at it.
    async fn client_for(router: Router) -> BackendClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let url = Url::parse(&format!("http://{addr}")).unwrap();
        BackendClient::new(&BackendConfig::new(url)).unwrap()
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(String::from)
    }

    #[tokio::test]
    async fn test_login_decodes_token_and_user() {
        let router = Router::new().route(
            "/api/auth/login",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["email"], "ada@robots.io");
                Json(json!({
                    "access_token": "a.b.c",
                    "token_type": "bearer",
                    "user": {"id": 1, "username": "ada", "email": "ada@robots.io", "role": "admin"}
                }))
            }),
        );
        let client = client_for(router).await;

        let auth = client.login("ada@robots.io", "secret1").await.unwrap();
        assert_eq!(auth.access_token.expose(), "a.b.c");
        assert!(auth.user.unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_error_body_becomes_typed_error() {
        let router = Router::new().route(
            "/api/auth/login",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"detail": "Invalid email or password"})),
                )
            }),
        );
        let client = client_for(router).await;

        let err = client.login("x@y.z", "nope").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.user_message(), "Invalid email or password");
    }

    #[tokio::test]
    async fn test_cart_calls_send_bearer_and_accept_both_shapes() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen_get = Arc::clone(&seen);
        let seen_put = Arc::clone(&seen);
        let router = Router::new()
            .route(
                "/api/cart/",
                get(move |headers: HeaderMap| {
                    seen_get.lock().unwrap().push(bearer(&headers).unwrap_or_default());
                    // Bare array shape.
                    async {
                        Json(json!([{
                            "id": 5, "product_id": "lidar", "product_name": "Lidar",
                            "product_price": 99.9, "quantity": 2, "added_at": null
                        }]))
                    }
                }),
            )
            .route(
                "/api/cart/update/{id}",
                put(
                    move |Path(id): Path<i64>, headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                        assert_eq!(id, 5);
                        assert_eq!(body["quantity"], 3);
                        seen_put.lock().unwrap().push(bearer(&headers).unwrap_or_default());
                        async { Json(json!({"message": "Cart item updated successfully"})) }
                    },
                ),
            )
            .route("/api/cart/clear", delete(|| async { StatusCode::NO_CONTENT }));
        let client = client_for(router).await;
        let token = AccessToken::new("tok-123");

        let cart = client.get_cart(&token).await.unwrap();
        assert_eq!(cart.total_items(), 2);
        client.update_cart_item(&token, CartItemId::new(5), 3).await.unwrap();
        client.clear_cart(&token).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["tok-123", "tok-123"]);
    }

    #[tokio::test]
    async fn test_product_detail_accepts_wrapped_record_and_404() {
        let router = Router::new().route(
            "/api/products/{id}",
            get(|Path(id): Path<String>| async move {
                if id == "servo" {
                    Json(json!({"product": {"id": "servo", "name": "Servo", "price": 12.0}}))
                        .into_response()
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({"error": "Product not found"})))
                        .into_response()
                }
            }),
        );
        let client = client_for(router).await;

        let product = client.get_product(&ProductId::new("servo")).await.unwrap();
        assert_eq!(product.name, "Servo");
        assert!(product.is_active);

        let err = client.get_product(&ProductId::new("missing")).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(ref m) if m == "Product not found"));
    }

    #[tokio::test]
    async fn test_list_products_sends_query() {
        let router = Router::new().route(
            "/api/products/",
            get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
                assert_eq!(q.get("per_page").map(String::as_str), Some("100"));
                assert_eq!(q.get("active_only").map(String::as_str), Some("true"));
                Json(json!({"products": [], "total": 0, "pages": 0, "current_page": 1}))
            }),
        );
        let client = client_for(router).await;

        let page = client
            .list_products(&ProductQuery::storefront(), None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_next());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{addr}")).unwrap();
        let client = BackendClient::new(&BackendConfig::new(url)).unwrap();

        let err = client.admin_stats(&AccessToken::new("t")).await.unwrap_err();
        assert!(matches!(err, BackendError::Http(_)));
        assert!(err.is_server_side());
        assert_eq!(err.user_message(), "Could not reach the store service");
    }
}
