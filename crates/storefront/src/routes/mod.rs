//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page (featured products)
//! GET  /store                  - Catalog with category/text/price filters
//! GET  /products/{id}          - Product detail
//!
//! # Cart (requires auth for mutations)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add to cart
//! POST /cart/update            - Set quantity (0 removes)
//! POST /cart/remove            - Remove item
//! POST /cart/clear             - Empty the cart
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout (requires auth)
//! GET  /checkout               - Shipping form
//! POST /checkout               - Place order
//!
//! # Auth
//! GET  /login                  - Login page
//! POST /login                  - Login action
//! GET  /register               - Register page
//! POST /register               - Register action
//! POST /logout                 - Logout action
//!
//! # Account (requires auth)
//! GET  /dashboard              - Profile summary and order history
//! GET  /profile/edit           - Edit profile form
//! POST /profile/edit           - Save profile
//!
//! # Admin (requires admin)
//! GET  /admin                  - Users / orders / products tabs
//! POST /admin/users/{id}/role  - Change a user's role
//! GET  /admin/dashboard        - Store statistics
//! GET  /admin/orders           - Order management
//! POST /admin/orders/{id}/status - Change an order's status
//! GET  /admin/stock            - Inventory with low-stock report
//! GET  /admin/stock/{id}/movements - Stock ledger for one product
//! POST /admin/stock/{id}       - Adjust stock by a signed delta
//! POST /admin/products         - Create a product
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod home;
pub mod products;
pub mod store;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::backend::Page;
use crate::services::flash::{self, Flash};
use crate::state::AppState;

/// `?page=` query shared by paginated pages.
#[derive(Debug, Default, Deserialize)]
pub struct PageParam {
    pub page: Option<u32>,
}

impl PageParam {
    /// Requested page, 1-based.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Pager state for templates, taken from the backend's `page`/`pages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            has_prev: false,
            has_next: false,
        }
    }
}

impl<T> From<&Page<T>> for Pagination {
    fn from(page: &Page<T>) -> Self {
        Self {
            current_page: page.current_page,
            total_pages: page.pages.max(1),
            has_prev: page.has_prev(),
            has_next: page.has_next(),
        }
    }
}

impl Pagination {
    #[must_use]
    pub const fn prev_page(&self) -> u32 {
        self.current_page.saturating_sub(1)
    }

    #[must_use]
    pub const fn next_page(&self) -> u32 {
        self.current_page + 1
    }
}

/// An `<option>` in a select box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
}

/// Queue `flash` and redirect to `to` (Post/Redirect/Get).
pub(crate) async fn redirect_with_flash(session: &Session, flash: Flash, to: &str) -> Redirect {
    flash::push(session, flash).await;
    Redirect::to(to)
}

/// The backend rejected the stored token: log out and send the visitor to login.
pub(crate) async fn session_expired(session: &Session) -> Redirect {
    if let Err(e) = crate::services::auth::logout(session).await {
        tracing::error!(error = %e, "Failed to clear rejected session");
    }
    crate::services::cart::reset_mirror(session).await;
    redirect_with_flash(
        session,
        Flash::error("Your session has expired, please log in again"),
        "/login",
    )
    .await
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin::overview))
        .route("/users/{id}/role", post(admin::update_role))
        .route("/dashboard", get(admin::dashboard::show))
        .route("/orders", get(admin::orders::index))
        .route("/orders/{id}/status", post(admin::orders::update_status))
        .route("/stock", get(admin::stock::index))
        .route("/stock/{id}", post(admin::stock::adjust))
        .route("/stock/{id}/movements", get(admin::stock::movements))
        .route("/products", post(admin::stock::create_product))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/store", get(store::index))
        .route("/products/{id}", get(products::show))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::submit))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/dashboard", get(account::dashboard))
        .route(
            "/profile/edit",
            get(account::edit_profile_page).post(account::edit_profile),
        )
        .nest("/admin", admin_routes())
}
