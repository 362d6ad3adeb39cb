//! Account route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use robostore_core::{Order, User};

use crate::backend::{BackendError, OrderQuery};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::routes::{PageParam, Pagination, redirect_with_flash, session_expired};
use crate::services::auth::{self, AuthService, ProfileChange};
use crate::services::flash::Flash;
use crate::state::AppState;

/// Orders per page on the dashboard.
const ORDERS_PER_PAGE: u32 = 10;

/// Order line display data.
#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub name: String,
    pub quantity: u32,
    pub price: String,
    pub line_total: String,
}

/// Order display data for templates.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: i64,
    pub status: String,
    pub status_label: String,
    pub total: String,
    pub date: String,
    pub shipping_address: String,
    pub phone: String,
    pub item_count: u64,
    pub items: Vec<OrderItemView>,
    /// Buyer, shown in admin listings.
    pub customer: Option<String>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.as_i64(),
            status: order.status.as_str().to_string(),
            status_label: order.status.label().to_string(),
            total: order.total_amount.display(),
            date: order
                .created_at
                .as_ref()
                .map(|at| at.date_time())
                .unwrap_or_default(),
            shipping_address: order.shipping_address.clone().unwrap_or_default(),
            phone: order.phone.clone().unwrap_or_default(),
            item_count: order.item_count(),
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    name: item.product_name.clone(),
                    quantity: item.quantity,
                    price: item.product_price.display(),
                    line_total: item.line_total().display(),
                })
                .collect(),
            customer: order
                .user
                .as_ref()
                .map(|user| format!("{} <{}>", user.username, user.email)),
        }
    }
}

/// Profile display data.
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub role: String,
    pub member_since: String,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            member_since: user
                .created_at
                .as_ref()
                .map(|at| at.date())
                .unwrap_or_default(),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "account/dashboard.html")]
pub struct DashboardTemplate {
    pub ctx: PageContext,
    pub profile: ProfileView,
    pub orders: Vec<OrderView>,
    pub pager: Pagination,
}

/// Edit profile template.
#[derive(Template, WebTemplate)]
#[template(path = "account/edit_profile.html")]
pub struct EditProfileTemplate {
    pub ctx: PageContext,
    pub username: String,
    pub email: String,
}

/// Edit profile form data.
#[derive(Debug, Deserialize)]
pub struct EditProfileForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl From<EditProfileForm> for ProfileChange {
    fn from(form: EditProfileForm) -> Self {
        Self {
            username: form.username,
            email: form.email,
            current_password: form.current_password,
            new_password: form.new_password,
            confirm_password: form.confirm_password,
        }
    }
}

/// Dashboard: profile summary and the visitor's own orders.
#[instrument(skip(state, session, auth, ctx))]
pub async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    mut ctx: PageContext,
    Query(params): Query<PageParam>,
) -> Response {
    let query = OrderQuery {
        page: params.page(),
        per_page: ORDERS_PER_PAGE,
        status: None,
    };

    let (orders, pager) = match state.backend().list_orders(&auth.token, &query).await {
        Ok(page) => (
            page.items.iter().map(OrderView::from).collect(),
            Pagination::from(&page),
        ),
        Err(BackendError::Unauthorized(_)) => {
            return session_expired(&session).await.into_response();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load order history");
            ctx.flash_now(Flash::error(e.user_message()));
            (Vec::new(), Pagination::default())
        }
    };

    DashboardTemplate {
        ctx,
        profile: ProfileView::from(&auth.user),
        orders,
        pager,
    }
    .into_response()
}

/// Redirect after the backend accepted a profile change.
///
/// When the session could not take the updated user it would keep showing
/// the old one, so the visitor is logged out and asked to log in again.
async fn after_profile_saved(session: &Session, refreshed: bool) -> Redirect {
    if refreshed {
        return redirect_with_flash(session, Flash::success("Profile updated"), "/dashboard").await;
    }
    tracing::error!("Profile saved but the session could not be refreshed");
    if let Err(e) = auth::logout(session).await {
        tracing::error!(error = %e, "Failed to clear stale session");
    }
    redirect_with_flash(
        session,
        Flash::error("Your profile was saved. Please log in again to continue"),
        "/login",
    )
    .await
}

/// Display the edit profile form.
#[instrument(skip(auth, ctx))]
pub async fn edit_profile_page(RequireAuth(auth): RequireAuth, ctx: PageContext) -> impl IntoResponse {
    EditProfileTemplate {
        ctx,
        username: auth.user.username,
        email: auth.user.email,
    }
}

/// Save profile changes. The updated user replaces the one in the session.
#[instrument(skip(state, session, auth, ctx, form))]
pub async fn edit_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(auth): RequireAuth,
    mut ctx: PageContext,
    Form(form): Form<EditProfileForm>,
) -> Response {
    let change = ProfileChange::from(form);

    match AuthService::new(state.backend())
        .update_profile(&auth, &change)
        .await
    {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "Profile updated");
            let refreshed = auth::login(&session, auth.token, Some(user)).await;
            after_profile_saved(&session, refreshed.is_some())
                .await
                .into_response()
        }
        Err(auth::AuthError::Backend(BackendError::Unauthorized(message))) => {
            tracing::warn!(%message, "Token rejected during profile update");
            session_expired(&session).await.into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Profile update failed");
            ctx.flash_now(Flash::error(e.user_message()));
            EditProfileTemplate {
                ctx,
                username: change.username,
                email: change.email,
            }
            .into_response()
        }
    }
}
