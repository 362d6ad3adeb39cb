//! Cart route handlers.
//!
//! Mutations are plain form posts: one backend call, a refetch, a flash and a
//! redirect back to the page the form lives on.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use robostore_core::{Cart, CartItem, CartItemId, ProductId};

use crate::backend::BackendError;
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext};
use crate::routes::{redirect_with_flash, session_expired};
use crate::services::cart::{self, CartContext, CartError};
use crate::services::flash::Flash;
use crate::state::AppState;

/// Cart line display data for templates.
#[derive(Debug, Clone)]
pub struct CartItemView {
    pub id: i64,
    pub product_url: String,
    pub name: String,
    pub price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.id.as_i64(),
            product_url: format!(
                "/products/{}",
                urlencoding::encode(item.product_id.as_str())
            ),
            name: item.product_name.clone(),
            price: item.product_price.display(),
            quantity: item.quantity,
            line_total: item.line_total().display(),
        }
    }
}

/// Cart display data for templates.
#[derive(Debug, Clone)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_amount: String,
    pub total_items: u64,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items.iter().map(CartItemView::from).collect(),
            total_amount: cart.total_amount().display(),
            total_items: cart.total_items(),
        }
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
    /// Page to return to; defaults to the cart.
    pub return_to: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub item_id: i64,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub item_id: i64,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
}

/// Cart count badge fragment template.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u64,
}

/// Only same-site relative paths are followed after a form post.
pub(crate) fn safe_return_path(path: Option<&str>, fallback: &str) -> String {
    path.filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
        .unwrap_or(fallback)
        .to_string()
}

async fn login_required(session: &Session) -> Redirect {
    redirect_with_flash(
        session,
        Flash::error(CartError::NotAuthenticated.to_string()),
        "/login",
    )
    .await
}

/// Flash and redirect for the outcome of a cart mutation.
async fn finish(
    session: &Session,
    result: Result<Cart, CartError>,
    success: &str,
    to: &str,
) -> Redirect {
    match result {
        Ok(_) => redirect_with_flash(session, Flash::success(success), to).await,
        Err(CartError::NotAuthenticated) => login_required(session).await,
        Err(e) if e.is_session_rejected() => session_expired(session).await,
        Err(e) => {
            tracing::warn!(error = %e, "Cart update failed");
            redirect_with_flash(session, Flash::error(e.user_message()), to).await
        }
    }
}

/// Display cart page.
#[instrument(skip(state, session, auth, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    mut ctx: PageContext,
) -> Response {
    let cart = match CartContext::new(state.backend(), &session, auth.as_ref())
        .load()
        .await
    {
        Ok(cart) => cart,
        Err(_) => return session_expired(&session).await.into_response(),
    };
    ctx.cart_count = cart.total_items();

    CartShowTemplate {
        ctx,
        cart: CartView::from(&cart),
    }
    .into_response()
}

/// Add item to cart.
///
/// The product is looked up first so the cart line records the catalog's
/// current name and price rather than whatever the form posted.
#[instrument(skip(state, session, auth))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Redirect {
    let Some(auth) = auth else {
        return login_required(&session).await;
    };
    let to = safe_return_path(form.return_to.as_deref(), "/cart");

    let product = match state
        .backend()
        .get_product(&ProductId::new(form.product_id.clone()))
        .await
    {
        Ok(product) => product,
        Err(BackendError::NotFound(_)) => {
            return redirect_with_flash(&session, Flash::error("Product not found"), &to).await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Product lookup failed");
            return redirect_with_flash(&session, Flash::error(e.user_message()), &to).await;
        }
    };

    let quantity = form.quantity.unwrap_or(1);
    add_breadcrumb("cart", "Add to cart", Some(&[("product_id", form.product_id.as_str())]));
    let result = CartContext::new(state.backend(), &session, Some(&auth))
        .add_to_cart(&product, quantity)
        .await;
    finish(&session, result, &format!("{} added to cart", product.name), &to).await
}

/// Update cart line quantity. Zero or less removes the line.
#[instrument(skip(state, session, auth))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Form(form): Form<UpdateCartForm>,
) -> Redirect {
    let result = CartContext::new(state.backend(), &session, auth.as_ref())
        .update_quantity(CartItemId::new(form.item_id), form.quantity)
        .await;
    finish(&session, result, "Cart updated", "/cart").await
}

/// Remove item from cart.
#[instrument(skip(state, session, auth))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Redirect {
    let result = CartContext::new(state.backend(), &session, auth.as_ref())
        .remove_from_cart(CartItemId::new(form.item_id))
        .await;
    finish(&session, result, "Item removed", "/cart").await
}

/// Empty the cart.
#[instrument(skip(state, session, auth))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(auth): OptionalAuth,
) -> Redirect {
    let result = CartContext::new(state.backend(), &session, auth.as_ref())
        .clear_cart()
        .await;
    finish(&session, result, "Cart cleared", "/cart").await
}

/// Cart count badge, read from the session mirror.
#[instrument(skip(session, auth))]
pub async fn count(session: Session, OptionalAuth(auth): OptionalAuth) -> impl IntoResponse {
    let count = if auth.is_some() {
        cart::mirror(&session).await.total_items()
    } else {
        0
    };
    CartCountTemplate { count }
}
