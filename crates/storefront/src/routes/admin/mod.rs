//! Admin console route handlers.
//!
//! Every handler takes [`RequireAdmin`]. Pages fetch what they show on each
//! request; mutations make one backend call and redirect back, so the next
//! render refetches.
//!
//! # Sections
//!
//! - `mod.rs` - tabbed overview (users / orders / products) and role changes
//! - [`dashboard`] - store statistics
//! - [`orders`] - order listing and status changes
//! - [`stock`] - inventory, stock movements and product creation

pub mod dashboard;
pub mod orders;
pub mod stock;

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use robostore_core::{Order, OrderStatus, Product, Role, User, UserId};

use crate::backend::{AdminStats, BackendError, OrderQuery, ProductQuery};
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::routes::account::OrderView;
use crate::routes::products::ProductView;
use crate::routes::{Pagination, SelectOption, redirect_with_flash, session_expired};
use crate::services::flash::Flash;
use crate::state::AppState;

/// Orders per page in admin listings.
pub const ORDERS_PER_PAGE: u32 = 10;

// =============================================================================
// Shared helpers
// =============================================================================

/// Redirect for a backend refusal of the admin's token, if `e` is one.
///
/// An expired token logs the visitor out; a token the backend no longer
/// considers admin (role changed elsewhere) goes back to the account page.
pub(crate) async fn token_rejected(session: &Session, e: &BackendError) -> Option<Redirect> {
    match e {
        BackendError::Unauthorized(_) => Some(session_expired(session).await),
        BackendError::Forbidden(message) => {
            tracing::warn!(%message, "Backend refused admin request");
            Some(redirect_with_flash(session, Flash::error("Admin access required"), "/dashboard").await)
        }
        _ => None,
    }
}

/// Flash and redirect for the outcome of an admin mutation.
pub(crate) async fn finish<T>(
    session: &Session,
    result: Result<T, BackendError>,
    success: impl FnOnce(T) -> String,
    to: &str,
) -> Redirect {
    match result {
        Ok(value) => redirect_with_flash(session, Flash::success(success(value)), to).await,
        Err(e) => {
            if let Some(redirect) = token_rejected(session, &e).await {
                return redirect;
            }
            tracing::warn!(error = %e, "Admin update failed");
            redirect_with_flash(session, Flash::error(e.user_message()), to).await
        }
    }
}

/// Order status choices.
pub(crate) fn status_options() -> Vec<SelectOption> {
    OrderStatus::ALL
        .iter()
        .map(|status| SelectOption {
            value: status.as_str(),
            label: status.label(),
        })
        .collect()
}

/// Role choices.
fn role_options() -> Vec<SelectOption> {
    Role::ALL
        .iter()
        .map(|role| SelectOption {
            value: role.as_str(),
            label: if role.is_admin() { "Admin" } else { "Consumer" },
        })
        .collect()
}

// =============================================================================
// View Types
// =============================================================================

/// Store-wide totals.
#[derive(Debug, Clone, Default)]
pub struct StatsView {
    pub total_users: u64,
    pub total_orders: u64,
    pub pending_orders: u64,
    pub total_revenue: String,
}

impl From<&AdminStats> for StatsView {
    fn from(stats: &AdminStats) -> Self {
        Self {
            total_users: stats.total_users,
            total_orders: stats.total_orders,
            pending_orders: stats.pending_orders,
            total_revenue: stats.total_revenue.display(),
        }
    }
}

/// Account row in the users tab.
#[derive(Debug, Clone)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub member_since: String,
    /// The admin viewing the page; their own role cannot be changed here.
    pub is_self: bool,
}

impl UserView {
    fn new(user: &User, viewer: UserId) -> Self {
        Self {
            id: user.id.as_i64(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            member_since: user
                .created_at
                .as_ref()
                .map(|at| at.date())
                .unwrap_or_default(),
            is_self: user.id == viewer,
        }
    }
}

/// Overview tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminTab {
    #[default]
    Users,
    Orders,
    Products,
}

impl AdminTab {
    /// Tab from `?tab=`; unknown values fall back to users.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("orders") => Self::Orders,
            Some("products") => Self::Products,
            _ => Self::Users,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Orders => "orders",
            Self::Products => "products",
        }
    }

    /// Placeholder for the tab's search box.
    #[must_use]
    pub const fn search_hint(&self) -> &'static str {
        match self {
            Self::Users => "Username or email",
            Self::Orders => "Order number, email or status",
            Self::Products => "Name or category",
        }
    }
}

/// Case-insensitive search over the rows the current tab fetched.
///
/// Only the loaded page is filtered; the backend has no search parameter.
#[derive(Debug, Clone, Default)]
pub struct TabSearch {
    text: String,
    needle: Option<String>,
}

impl TabSearch {
    #[must_use]
    pub fn new(q: Option<&str>) -> Self {
        let text = q.map(str::trim).unwrap_or_default().to_string();
        let needle = (!text.is_empty()).then(|| text.to_lowercase());
        Self { text, needle }
    }

    /// The trimmed search text, empty when not searching.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    fn hit(&self, fields: &[&str]) -> bool {
        self.needle.as_ref().is_none_or(|needle| {
            fields
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str()))
        })
    }

    #[must_use]
    pub fn user(&self, user: &User) -> bool {
        self.hit(&[user.username.as_str(), user.email.as_str()])
    }

    #[must_use]
    pub fn order(&self, order: &Order) -> bool {
        let id = order.id.to_string();
        let email = order.user.as_ref().map_or("", |user| user.email.as_str());
        self.hit(&[id.as_str(), email, order.status.as_str()])
    }

    #[must_use]
    pub fn product(&self, product: &Product) -> bool {
        self.hit(&[product.name.as_str(), product.category.as_str()])
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Admin overview template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/overview.html")]
pub struct OverviewTemplate {
    pub ctx: PageContext,
    pub tab: &'static str,
    pub search_hint: &'static str,
    /// Current search text, echoed into the search box.
    pub search: String,
    /// This tab (with its search) as a link; pages and forms return here.
    pub tab_url: String,
    pub pager_base: String,
    pub stats: StatsView,
    pub users: Vec<UserView>,
    pub orders: Vec<OrderView>,
    pub products: Vec<ProductView>,
    pub pager: Pagination,
    pub roles: Vec<SelectOption>,
    pub statuses: Vec<SelectOption>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `?tab=&page=&q=` on the overview.
#[derive(Debug, Deserialize)]
pub struct OverviewQuery {
    pub tab: Option<String>,
    pub page: Option<u32>,
    pub q: Option<String>,
}

/// Link to `tab`, keeping the search text.
fn tab_url(tab: AdminTab, search: &TabSearch) -> String {
    match search.text() {
        "" => format!("/admin?tab={}", tab.as_str()),
        text => format!("/admin?tab={}&q={}", tab.as_str(), urlencoding::encode(text)),
    }
}

/// Tab contents loaded for one render.
#[derive(Default)]
struct TabData {
    users: Vec<UserView>,
    orders: Vec<OrderView>,
    products: Vec<ProductView>,
    pager: Pagination,
}

/// Tabbed overview with the store totals on top.
#[instrument(skip(state, session, admin, ctx))]
pub async fn overview(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    mut ctx: PageContext,
    Query(query): Query<OverviewQuery>,
) -> Response {
    let tab = AdminTab::parse(query.tab.as_deref());
    let search = TabSearch::new(query.q.as_deref());
    let page = query.page.unwrap_or(1).max(1);
    let backend = state.backend();
    let token = &admin.token;

    let tab_data = async {
        match tab {
            AdminTab::Users => backend.list_users(token, page).await.map(|users| TabData {
                users: users
                    .items
                    .iter()
                    .filter(|user| search.user(user))
                    .map(|user| UserView::new(user, admin.user.id))
                    .collect(),
                pager: Pagination::from(&users),
                ..TabData::default()
            }),
            AdminTab::Orders => {
                let query = OrderQuery {
                    page,
                    per_page: ORDERS_PER_PAGE,
                    status: None,
                };
                backend.list_orders(token, &query).await.map(|orders| TabData {
                    orders: orders
                        .items
                        .iter()
                        .filter(|order| search.order(order))
                        .map(OrderView::from)
                        .collect(),
                    pager: Pagination::from(&orders),
                    ..TabData::default()
                })
            }
            AdminTab::Products => {
                let query = ProductQuery::inventory(1, ProductQuery::MAX_PER_PAGE);
                backend
                    .list_products(&query, Some(token))
                    .await
                    .map(|products| TabData {
                        products: products
                            .items
                            .iter()
                            .filter(|product| search.product(product))
                            .map(ProductView::from)
                            .collect(),
                        ..TabData::default()
                    })
            }
        }
    };

    let (stats, tab_data) = tokio::join!(backend.admin_stats(token), tab_data);

    let stats = match stats {
        Ok(stats) => StatsView::from(&stats),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, "Failed to load admin stats");
            StatsView::default()
        }
    };

    let tab_data = match tab_data {
        Ok(data) => data,
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, tab = tab.as_str(), "Failed to load admin tab");
            ctx.flash_now(Flash::error(e.user_message()));
            TabData::default()
        }
    };

    let tab_url = tab_url(tab, &search);
    OverviewTemplate {
        ctx,
        tab: tab.as_str(),
        search_hint: tab.search_hint(),
        search: search.text().to_string(),
        pager_base: format!("{tab_url}&"),
        tab_url,
        stats,
        users: tab_data.users,
        orders: tab_data.orders,
        products: tab_data.products,
        pager: tab_data.pager,
        roles: role_options(),
        statuses: status_options(),
    }
    .into_response()
}

/// Role change form data.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

/// Change a user's role.
#[instrument(skip(state, session, admin))]
pub async fn update_role(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    const BACK: &str = "/admin?tab=users";
    let id = UserId::new(id);

    let Ok(role) = Role::from_str(&form.role) else {
        let message = format!("Invalid role: {}", form.role);
        return redirect_with_flash(&session, Flash::error(message), BACK).await;
    };
    if id == admin.user.id {
        return redirect_with_flash(
            &session,
            Flash::error("You cannot change your own role"),
            BACK,
        )
        .await;
    }

    let result = state
        .backend()
        .update_user_role(&admin.token, id, role)
        .await;
    if result.is_ok() {
        tracing::info!(user_id = %id, role = role.as_str(), "User role updated");
    }
    finish(&session, result, |()| format!("User role changed to {role}"), BACK).await
}
