//! Cart context.
//!
//! The backend owns the cart. Every mutation is one REST call followed by a
//! full refetch; the refetched cart is mirrored into the session so the
//! header badge can render without another backend round-trip.

use thiserror::Error;
use tower_sessions::Session;
use tracing::instrument;

use robostore_core::{Cart, CartItemId, Order, Product};

use crate::backend::{AccessToken, AddToCart, BackendClient, BackendError, NewOrder};
use crate::models::{AuthSession, session_keys};

/// Cart operation errors.
#[derive(Debug, Error)]
pub enum CartError {
    /// The visitor is not logged in; no request was sent.
    #[error("Please log in to manage your cart")]
    NotAuthenticated,

    #[error("Quantity must be between 1 and {max}", max = Cart::MAX_LINE_QUANTITY)]
    InvalidQuantity,

    /// The line would hold more than [`Cart::MAX_LINE_QUANTITY`] units.
    #[error("You can have at most {max} of one product in your cart", max = Cart::MAX_LINE_QUANTITY)]
    LineLimit,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CartError {
    /// Message suitable for a flash.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    /// The backend refused the stored token.
    #[must_use]
    pub const fn is_session_rejected(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Unauthorized(_)))
    }
}

/// Per-request view of the visitor's cart.
pub struct CartContext<'a> {
    backend: &'a BackendClient,
    session: &'a Session,
    auth: Option<&'a AuthSession>,
}

impl<'a> CartContext<'a> {
    #[must_use]
    pub const fn new(
        backend: &'a BackendClient,
        session: &'a Session,
        auth: Option<&'a AuthSession>,
    ) -> Self {
        Self {
            backend,
            session,
            auth,
        }
    }

    fn token(&self) -> Result<&'a AccessToken, CartError> {
        self.auth
            .map(|auth| &auth.token)
            .ok_or(CartError::NotAuthenticated)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch the cart and refresh the session mirror.
    ///
    /// Anonymous visitors always have an empty cart. A failed fetch is logged
    /// and also yields an empty cart.
    pub async fn fetch_cart(&self) -> Cart {
        self.load().await.unwrap_or_default()
    }

    /// Like [`Self::fetch_cart`], but a token the backend rejects is
    /// returned as an error so the caller can end the session.
    ///
    /// Anonymous visitors never touch the session here.
    ///
    /// # Errors
    ///
    /// Returns `Backend(Unauthorized)` when the token is refused.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Cart, CartError> {
        let Some(auth) = self.auth else {
            return Ok(Cart::empty());
        };
        let cart = match self.backend.get_cart(&auth.token).await {
            Ok(cart) => cart,
            Err(e @ BackendError::Unauthorized(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch cart");
                Cart::empty()
            }
        };
        store_mirror(self.session, &cart).await;
        Ok(cart)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` before any request for anonymous visitors,
    /// `InvalidQuantity` or `LineLimit` when the line would leave
    /// `1..=MAX_LINE_QUANTITY`, or the backend's error (the cart is refetched
    /// either way).
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: &Product, quantity: u32) -> Result<Cart, CartError> {
        let token = self.token()?;
        if !(1..=Cart::MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(CartError::InvalidQuantity);
        }
        let in_cart = mirror(self.session).await.quantity_of(&product.id);
        if in_cart.saturating_add(quantity) > Cart::MAX_LINE_QUANTITY {
            return Err(CartError::LineLimit);
        }
        let result = self
            .backend
            .add_to_cart(token, &AddToCart::for_product(product, quantity))
            .await;
        self.refetch_after(result).await
    }

    /// Set an item's quantity. Zero or less removes the item.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_to_cart`].
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, id: CartItemId, quantity: i64) -> Result<Cart, CartError> {
        let token = self.token()?;
        if quantity < 1 {
            return self.remove_from_cart(id).await;
        }
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= Cart::MAX_LINE_QUANTITY)
            .ok_or(CartError::LineLimit)?;
        let result = self.backend.update_cart_item(token, id, quantity).await;
        self.refetch_after(result).await
    }

    /// Remove an item.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_to_cart`].
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, id: CartItemId) -> Result<Cart, CartError> {
        let token = self.token()?;
        let result = self.backend.remove_cart_item(token, id).await;
        self.refetch_after(result).await
    }

    /// Remove every item.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_to_cart`].
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart, CartError> {
        let token = self.token()?;
        let result = self.backend.clear_cart(token).await;
        self.refetch_after(result).await
    }

    /// Turn the current cart into an order.
    ///
    /// The backend empties the cart on success; the refetch picks that up.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated`, `EmptyCart` when there is nothing to
    /// order, or the backend's error.
    #[instrument(skip(self, order))]
    pub async fn checkout(&self, order: &NewOrder) -> Result<Order, CartError> {
        let token = self.token()?;
        if self.load().await?.is_empty() {
            return Err(CartError::EmptyCart);
        }
        let result = self.backend.create_order(token, order).await;
        self.fetch_cart().await;
        let order = result?;
        tracing::info!(order_id = %order.id, total = %order.total_amount, "Order placed");
        Ok(order)
    }

    async fn refetch_after(&self, result: Result<(), BackendError>) -> Result<Cart, CartError> {
        let cart = self.load().await?;
        result?;
        Ok(cart)
    }
}

// =============================================================================
// Session Mirror
// =============================================================================

/// Cart last fetched for this session. Empty when none is stored.
pub async fn mirror(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Forget the mirrored cart (on logout).
pub async fn reset_mirror(session: &Session) {
    if let Err(e) = session.remove_value(session_keys::CART).await {
        tracing::error!(error = %e, "Failed to reset cart mirror");
    }
}

async fn store_mirror(session: &Session, cart: &Cart) {
    if let Err(e) = session.insert(session_keys::CART, cart).await {
        tracing::error!(error = %e, "Failed to store cart mirror");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{delete, get, put},
    };
    use robostore_core::{CartItem, Price, ProductId, Role, User, UserId};
    use serde_json::json;
    use tower_sessions::MemoryStore;
    use url::Url;

    use super::*;
    use crate::config::BackendConfig;

    type Calls = Arc<Mutex<Vec<String>>>;

    async fn backend_for(router: Router) -> BackendClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let url = Url::parse(&format!("http://{addr}")).unwrap();
        BackendClient::new(&BackendConfig::new(url)).unwrap()
    }

    /// A backend that is never reached.
    fn offline_backend() -> BackendClient {
        BackendClient::new(&BackendConfig::new(Url::parse("http://127.0.0.1:9").unwrap())).unwrap()
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn auth() -> AuthSession {
        AuthSession {
            token: AccessToken::new("token"),
            user: User {
                id: UserId::new(1),
                username: "ada".to_string(),
                email: "ada@robots.io".to_string(),
                role: Role::Consumer,
                created_at: None,
                avatar_url: None,
            },
        }
    }

    fn product() -> Product {
        Product {
            id: ProductId::new("arm-01"),
            name: "Servo Arm".to_string(),
            price: Price::from_cents(12_50),
            category: "parts".to_string(),
            description: None,
            image_url: None,
            stock_quantity: 4,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn cart_json() -> serde_json::Value {
        json!({
            "cart_items": [{
                "id": 5, "product_id": "arm-01", "product_name": "Servo Arm",
                "product_price": 12.5, "quantity": 2
            }],
            "total_items": 2
        })
    }

    fn cart_route(calls: &Calls) -> Router {
        let calls = calls.clone();
        Router::new().route(
            "/api/cart/",
            get(move || {
                calls.lock().unwrap().push("GET cart".to_string());
                async { Json(cart_json()) }
            }),
        )
    }

    #[tokio::test]
    async fn test_anonymous_cart_is_empty() {
        let backend = offline_backend();
        let session = session();
        let cart = CartContext::new(&backend, &session, None).fetch_cart().await;
        assert!(cart.is_empty());
        assert!(!session.is_modified(), "anonymous carts are not stored");
    }

    #[tokio::test]
    async fn test_rejected_token_is_reported() {
        let router = Router::new().route(
            "/api/cart/",
            get(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"detail": "Could not validate credentials"})),
                )
            }),
        );
        let backend = backend_for(router).await;
        let session = session();
        let auth = auth();
        let ctx = CartContext::new(&backend, &session, Some(&auth));

        assert!(ctx.load().await.unwrap_err().is_session_rejected());
        assert!(ctx.fetch_cart().await.is_empty());
        assert!(ctx.clear_cart().await.unwrap_err().is_session_rejected());
    }

    #[tokio::test]
    async fn test_line_limit_is_checked_before_any_request() {
        let backend = offline_backend();
        let session = session();
        let auth = auth();
        let mut line: CartItem = serde_json::from_value(cart_json()["cart_items"][0].clone()).unwrap();
        line.quantity = 98;
        store_mirror(&session, &Cart::new(vec![line])).await;
        let ctx = CartContext::new(&backend, &session, Some(&auth));

        assert!(matches!(
            ctx.add_to_cart(&product(), 2).await,
            Err(CartError::LineLimit)
        ));
        assert!(matches!(
            ctx.add_to_cart(&product(), 100).await,
            Err(CartError::InvalidQuantity)
        ));
        assert!(matches!(
            ctx.update_quantity(CartItemId::new(5), i64::from(u32::MAX) + 1).await,
            Err(CartError::LineLimit)
        ));
    }

    #[tokio::test]
    async fn test_anonymous_mutations_rejected() {
        let backend = offline_backend();
        let session = session();
        let ctx = CartContext::new(&backend, &session, None);

        assert!(matches!(
            ctx.add_to_cart(&product(), 1).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(matches!(
            ctx.update_quantity(CartItemId::new(1), 3).await,
            Err(CartError::NotAuthenticated)
        ));
        assert!(matches!(ctx.clear_cart().await, Err(CartError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_fetch_mirrors_cart() {
        let calls = Calls::default();
        let backend = backend_for(cart_route(&calls)).await;
        let session = session();
        let auth = auth();

        let cart = CartContext::new(&backend, &session, Some(&auth)).fetch_cart().await;
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_amount(), Price::from_cents(25_00));
        assert_eq!(mirror(&session).await, cart);
    }

    #[tokio::test]
    async fn test_zero_quantity_removes_item() {
        let calls = Calls::default();
        let removed = calls.clone();
        let router = cart_route(&calls)
            .route(
                "/api/cart/remove/{id}",
                delete(move |Path(id): Path<i64>| {
                    removed.lock().unwrap().push(format!("DELETE {id}"));
                    async { Json(json!({"message": "removed"})) }
                }),
            )
            .route(
                "/api/cart/update/{id}",
                put(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            );
        let backend = backend_for(router).await;
        let session = session();
        let auth = auth();

        CartContext::new(&backend, &session, Some(&auth))
            .update_quantity(CartItemId::new(5), 0)
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.as_slice(), ["DELETE 5", "GET cart"]);
    }

    #[tokio::test]
    async fn test_failed_mutation_still_refetches() {
        let calls = Calls::default();
        let router = cart_route(&calls).route(
            "/api/cart/add",
            axum::routing::post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Insufficient stock"})),
                )
            }),
        );
        let backend = backend_for(router).await;
        let session = session();
        let auth = auth();

        let err = CartContext::new(&backend, &session, Some(&auth))
            .add_to_cart(&product(), 9)
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Insufficient stock");
        assert_eq!(calls.lock().unwrap().as_slice(), ["GET cart"]);
        assert_eq!(mirror(&session).await.total_items(), 2);
    }

    #[tokio::test]
    async fn test_failed_refetch_yields_empty_cart() {
        let router = Router::new().route(
            "/api/cart/",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let backend = backend_for(router).await;
        let session = session();
        let auth = auth();

        let cart = CartContext::new(&backend, &session, Some(&auth)).fetch_cart().await;
        assert!(cart.is_empty());
        assert!(mirror(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_rejects_empty_cart() {
        let router = Router::new().route("/api/cart/", get(|| async { Json(json!([])) }));
        let backend = backend_for(router).await;
        let session = session();
        let auth = auth();

        let order = NewOrder {
            shipping_address: Some("1 Main St".to_string()),
            phone: None,
        };
        let err = CartContext::new(&backend, &session, Some(&auth))
            .checkout(&order)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::EmptyCart));
    }

    #[tokio::test]
    async fn test_reset_mirror() {
        let session = session();
        store_mirror(&session, &Cart::new(vec![])).await;
        reset_mirror(&session).await;
        assert!(session.get::<Cart>(session_keys::CART).await.unwrap().is_none());
    }
}
