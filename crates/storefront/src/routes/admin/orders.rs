//! Admin order management.

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

use robostore_core::{OrderId, OrderStatus};

use crate::backend::OrderQuery;
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::routes::account::OrderView;
use crate::routes::cart::safe_return_path;
use crate::routes::{Pagination, SelectOption, redirect_with_flash};
use crate::services::flash::Flash;
use crate::state::AppState;

use super::dashboard::{OrderStatsView, StatusCount};
use super::{ORDERS_PER_PAGE, finish, status_options, token_rejected};

/// `?page=&status=` on the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<u32>,
    pub status: Option<String>,
}

impl OrdersQuery {
    /// Status filter; empty or unknown values mean "all".
    fn status(&self) -> Option<OrderStatus> {
        self.status
            .as_deref()
            .and_then(|status| OrderStatus::from_str(status).ok())
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct AdminOrdersTemplate {
    pub ctx: PageContext,
    pub orders: Vec<OrderView>,
    pub pager: Pagination,
    pub status_counts: Vec<StatusCount>,
    pub total_revenue: String,
    pub selected_status: String,
    pub statuses: Vec<SelectOption>,
    /// This page's URL, posted back by the status forms.
    pub return_to: String,
    /// Pager link prefix keeping the status filter.
    pub pager_base: String,
}

/// Paginated order list, optionally filtered by status.
#[instrument(skip(state, session, admin, ctx))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    mut ctx: PageContext,
    Query(query): Query<OrdersQuery>,
) -> Response {
    let status = query.status();
    let page = query.page.unwrap_or(1).max(1);
    let order_query = OrderQuery {
        page,
        per_page: ORDERS_PER_PAGE,
        status,
    };

    let backend = state.backend();
    let (orders, stats) = tokio::join!(
        backend.list_orders(&admin.token, &order_query),
        backend.order_stats(&admin.token)
    );

    let (orders, pager) = match orders {
        Ok(page) => (
            page.items.iter().map(OrderView::from).collect(),
            Pagination::from(&page),
        ),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, "Failed to load orders");
            ctx.flash_now(Flash::error(e.user_message()));
            (Vec::new(), Pagination::default())
        }
    };

    let stats = stats.map_or_else(
        |e| {
            tracing::warn!(error = %e, "Failed to load order stats");
            OrderStatsView::default()
        },
        |stats| OrderStatsView::from(&stats),
    );

    let selected_status = status.map(|s| s.as_str().to_string()).unwrap_or_default();
    let pager_base = if selected_status.is_empty() {
        "/admin/orders?".to_string()
    } else {
        format!("/admin/orders?status={selected_status}&")
    };
    let return_to = format!("{pager_base}page={}", pager.current_page);

    AdminOrdersTemplate {
        ctx,
        orders,
        pager,
        status_counts: stats.status_counts,
        total_revenue: stats.total_revenue,
        selected_status,
        statuses: status_options(),
        return_to,
        pager_base,
    }
    .into_response()
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    pub return_to: Option<String>,
}

/// Move an order to a new status.
///
/// The value is checked against the known statuses before the backend is
/// called; the backend decides whether the transition itself is allowed.
#[instrument(skip(state, session, admin))]
pub async fn update_status(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> Redirect {
    let to = safe_return_path(form.return_to.as_deref(), "/admin/orders");
    let id = OrderId::new(id);

    let Ok(status) = OrderStatus::from_str(&form.status) else {
        let message = format!("Invalid order status: {}", form.status);
        return redirect_with_flash(&session, Flash::error(message), &to).await;
    };

    let result = state
        .backend()
        .update_order_status(&admin.token, id, status)
        .await;
    if result.is_ok() {
        tracing::info!(order_id = %id, status = status.as_str(), "Order status updated");
    }
    finish(
        &session,
        result,
        |()| format!("Order #{id} marked as {}", status.label()),
        &to,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter() {
        let query = OrdersQuery {
            page: None,
            status: Some("shipped".to_string()),
        };
        assert_eq!(query.status(), Some(OrderStatus::Shipped));

        let query = OrdersQuery {
            page: None,
            status: Some(String::new()),
        };
        assert_eq!(query.status(), None);

        let query = OrdersQuery {
            page: None,
            status: Some("lost".to_string()),
        };
        assert_eq!(query.status(), None);
    }
}
