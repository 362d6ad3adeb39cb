//! Checkout route handlers.
//!
//! Payment is a placeholder: placing the order is a single backend call that
//! turns the server-side cart into a pending order.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use robostore_core::Email;

use crate::backend::NewOrder;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::routes::cart::CartView;
use crate::routes::{redirect_with_flash, session_expired};
use crate::services::cart::{CartContext, CartError};
use crate::services::flash::Flash;
use crate::state::AppState;

/// Checkout form data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub phone: String,
}

impl CheckoutForm {
    /// Pre-fill from the logged-in user.
    fn for_user(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            ..Self::default()
        }
    }

    /// Check required fields and build the order request.
    ///
    /// # Errors
    ///
    /// Returns the message to show next to the form.
    pub fn validate(&self) -> Result<NewOrder, String> {
        let required = [
            ("Name", &self.name),
            ("Email", &self.email),
            ("Address", &self.address),
            ("City", &self.city),
            ("Postal code", &self.postal_code),
        ];
        if let Some((label, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("{label} is required"));
        }
        Email::parse(&self.email).map_err(|e| format!("Invalid email: {e}"))?;

        let phone = self.phone.trim();
        Ok(NewOrder {
            shipping_address: Some(format!(
                "{}, {}, {}",
                self.address.trim(),
                self.city.trim(),
                self.postal_code.trim()
            )),
            phone: (!phone.is_empty()).then(|| phone.to_string()),
        })
    }
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub ctx: PageContext,
    pub cart: CartView,
    pub form: CheckoutForm,
}

/// Display the checkout form.
#[instrument(skip(state, session, auth, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    mut ctx: PageContext,
) -> Response {
    let cart = match CartContext::new(state.backend(), &session, Some(&auth))
        .load()
        .await
    {
        Ok(cart) => cart,
        Err(_) => return session_expired(&session).await.into_response(),
    };
    if cart.is_empty() {
        return redirect_with_flash(&session, Flash::error(CartError::EmptyCart.to_string()), "/cart")
            .await
            .into_response();
    }
    ctx.cart_count = cart.total_items();

    CheckoutTemplate {
        ctx,
        cart: CartView::from(&cart),
        form: CheckoutForm::for_user(auth.user.display_name(), &auth.user.email),
    }
    .into_response()
}

/// Place the order.
#[instrument(skip(state, session, auth, ctx, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    mut ctx: PageContext,
    Form(form): Form<CheckoutForm>,
) -> Response {
    let carts = CartContext::new(state.backend(), &session, Some(&auth));

    let result = match form.validate() {
        Ok(order) => carts.checkout(&order).await,
        Err(message) => {
            ctx.flash_now(Flash::error(message));
            let Ok(cart) = carts.load().await else {
                return session_expired(&session).await.into_response();
            };
            return CheckoutTemplate {
                ctx,
                cart: CartView::from(&cart),
                form,
            }
            .into_response();
        }
    };

    match result {
        Ok(order) => {
            redirect_with_flash(
                &session,
                Flash::success(format!("Order #{} placed successfully", order.id)),
                "/dashboard",
            )
            .await
            .into_response()
        }
        Err(e) if e.is_session_rejected() => session_expired(&session).await.into_response(),
        Err(CartError::EmptyCart) => {
            redirect_with_flash(&session, Flash::error(CartError::EmptyCart.to_string()), "/cart")
                .await
                .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Checkout failed");
            redirect_with_flash(&session, Flash::error(e.user_message()), "/checkout")
                .await
                .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filled() -> CheckoutForm {
        CheckoutForm {
            name: "Ada Lovelace".to_string(),
            email: "ada@robots.io".to_string(),
            address: " 1 Engine Rd ".to_string(),
            city: "London".to_string(),
            postal_code: "N1".to_string(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_shipping_address_is_joined() {
        let order = filled().validate().unwrap();
        assert_eq!(order.shipping_address.as_deref(), Some("1 Engine Rd, London, N1"));
        assert!(order.phone.is_none());
    }

    #[test]
    fn test_required_fields() {
        let form = CheckoutForm {
            city: "  ".to_string(),
            ..filled()
        };
        assert_eq!(form.validate().unwrap_err(), "City is required");

        let form = CheckoutForm {
            email: "nope".to_string(),
            ..filled()
        };
        assert!(form.validate().unwrap_err().starts_with("Invalid email"));
    }

    #[test]
    fn test_phone_is_sent_when_given() {
        let form = CheckoutForm {
            phone: "+44 20 7946 0000".to_string(),
            ..filled()
        };
        assert_eq!(form.validate().unwrap().phone.as_deref(), Some("+44 20 7946 0000"));
    }
}
