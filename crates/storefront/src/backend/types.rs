//! Request and response bodies for the backend REST API.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use robostore_core::{
    Cart, CartItem, Order, OrderStatus, Price, Product, ProductId, Role, User,
};

// =============================================================================
// Auth
// =============================================================================

/// Bearer token issued by the backend.
///
/// Serialized in clear so it can live in the server-side session store; the
/// `Debug` output never shows it.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl Serialize for AccessToken {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// Response to login and registration.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Older backends return only the token; the user is then read from its claims.
    #[serde(default)]
    pub user: Option<User>,
}

/// Profile update. Password fields are sent only when changing the password.
#[derive(Debug, Serialize)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleUpdate {
    pub role: Role,
}

// =============================================================================
// Pagination
// =============================================================================

/// One page of a server-paginated listing.
///
/// Each endpoint names its item list differently (`products`, `orders`,
/// `users`, `movements`); all of them decode into `items`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(alias = "products", alias = "orders", alias = "users", alias = "movements")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub pages: u32,
    #[serde(default = "first_page")]
    pub current_page: u32,
}

const fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.current_page < self.pages
    }
}

/// Query for `GET /api/products/`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub active_only: bool,
}

impl ProductQuery {
    /// Largest page size the backend accepts.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Everything the public store shows, in one page.
    #[must_use]
    pub const fn storefront() -> Self {
        Self {
            page: 1,
            per_page: Self::MAX_PER_PAGE,
            category: None,
            active_only: true,
        }
    }

    /// Admin inventory listing, including inactive products.
    #[must_use]
    pub const fn inventory(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            category: None,
            active_only: false,
        }
    }
}

/// Query for `GET /api/orders/`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageQuery {
    pub page: u32,
}

// =============================================================================
// Catalog & inventory
// =============================================================================

/// Body of `POST /api/products/`.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub image_url: String,
    pub stock_quantity: i64,
    pub is_active: bool,
}

/// Body of `PUT /api/products/{id}/stock`: a signed delta, not an absolute level.
#[derive(Debug, Clone, Serialize)]
pub struct StockAdjustment {
    pub quantity: i64,
    pub reason: String,
}

/// Response to a stock adjustment.
#[derive(Debug, Clone, Deserialize)]
pub struct StockUpdate {
    #[serde(default)]
    pub message: Option<String>,
    pub old_stock: i64,
    pub new_stock: i64,
    pub change: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdQuery {
    pub threshold: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LowStockReport {
    pub products: Vec<Product>,
    #[serde(default)]
    pub threshold: i64,
    #[serde(default)]
    pub count: u64,
}

// =============================================================================
// Cart & orders
// =============================================================================

/// Body of `POST /api/cart/add`.
///
/// The name and price are snapshotted into the cart line by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    pub quantity: u32,
}

impl AddToCart {
    #[must_use]
    pub fn for_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            product_price: product.price,
            quantity,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}

/// `GET /api/cart/` returns either an envelope or a bare item list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CartPayload {
    Envelope { cart_items: Vec<CartItem> },
    Items(Vec<CartItem>),
}

impl From<CartPayload> for Cart {
    fn from(payload: CartPayload) -> Self {
        match payload {
            CartPayload::Envelope { cart_items } | CartPayload::Items(cart_items) => {
                Self::new(cart_items)
            }
        }
    }
}

/// Body of `POST /api/orders/`. The order lines come from the server-side cart.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

// =============================================================================
// Statistics
// =============================================================================

/// `GET /api/admin/stats`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_orders: u64,
    #[serde(default)]
    pub pending_orders: u64,
    #[serde(default)]
    pub total_revenue: Price,
}

/// `GET /api/orders/stats`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStats {
    #[serde(default)]
    pub status_counts: HashMap<String, u64>,
    #[serde(default)]
    pub total_revenue: Price,
    #[serde(default)]
    pub pending_revenue: Price,
    #[serde(default)]
    pub recent_orders: Vec<Order>,
}

impl OrderStats {
    #[must_use]
    pub fn count(&self, status: OrderStatus) -> u64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }
}

// =============================================================================
// Envelope helpers
// =============================================================================

/// Decode a record that may arrive bare or wrapped as `{"<key>": record, ...}`.
///
/// # Errors
///
/// Returns the decode error when neither shape matches `T`.
pub fn decode_maybe_wrapped<T: DeserializeOwned>(
    mut value: serde_json::Value,
    key: &str,
) -> Result<T, serde_json::Error> {
    if let Some(inner) = value.as_object_mut().and_then(|object| object.remove(key)) {
        return serde_json::from_value(inner);
    }
    serde_json::from_value(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ITEM: &str = r#"{"id": 1, "product_id": "servo", "product_name": "Servo", "product_price": 10.5, "quantity": 2, "added_at": null}"#;

    #[test]
    fn test_cart_payload_envelope() {
        let body = format!(r#"{{"cart_items": [{ITEM}], "total_items": 99, "total_amount": 0}}"#);
        let cart: Cart = serde_json::from_str::<CartPayload>(&body).unwrap().into();
        assert_eq!(cart.items.len(), 1);
        // Totals are recomputed, not taken from the wire.
        assert_eq!(cart.total_items(), 2);
        assert_eq!(cart.total_amount(), Price::from_cents(2100));
    }

    #[test]
    fn test_cart_payload_bare_array() {
        let body = format!("[{ITEM}, {ITEM}]");
        let cart: Cart = serde_json::from_str::<CartPayload>(&body).unwrap().into();
        assert_eq!(cart.total_items(), 4);

        let empty: Cart = serde_json::from_str::<CartPayload>("[]").unwrap().into();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_page_aliases_and_defaults() {
        let page: Page<serde_json::Value> =
            serde_json::from_str(r#"{"orders": [1, 2], "total": 12, "pages": 2, "current_page": 1}"#)
                .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_next());
        assert!(!page.has_prev());

        let bare: Page<serde_json::Value> = serde_json::from_str(r#"{"movements": []}"#).unwrap();
        assert_eq!(bare.pages, 1);
        assert!(!bare.has_next());
    }

    #[test]
    fn test_decode_maybe_wrapped() {
        let user = r#"{"id": 1, "username": "ada", "email": "ada@robots.io", "role": "consumer"}"#;
        let wrapped = serde_json::from_str(&format!(r#"{{"message": "ok", "user": {user}}}"#)).unwrap();
        let bare = serde_json::from_str(user).unwrap();

        let a: User = decode_maybe_wrapped(wrapped, "user").unwrap();
        let b: User = decode_maybe_wrapped(bare, "user").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("eyJhbGciOi.secret.sig");
        assert_eq!(format!("{token:?}"), "AccessToken([REDACTED])");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"eyJhbGciOi.secret.sig\"");
    }

    #[test]
    fn test_order_stats_count() {
        let stats: OrderStats = serde_json::from_str(
            r#"{"status_counts": {"pending": 3, "shipped": 1}, "total_revenue": 150.0, "pending_revenue": 0, "recent_orders": []}"#,
        )
        .unwrap();
        assert_eq!(stats.count(OrderStatus::Pending), 3);
        assert_eq!(stats.count(OrderStatus::Delivered), 0);
        assert_eq!(stats.total_revenue, Price::from_cents(15000));
    }

    #[test]
    fn test_product_query_serializes_for_url() {
        let json = serde_json::to_value(ProductQuery::storefront()).unwrap();
        assert_eq!(json["per_page"], 100);
        assert_eq!(json["active_only"], true);
        assert!(json.get("category").is_none());
    }
}
