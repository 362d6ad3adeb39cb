//! Admin statistics dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use robostore_core::OrderStatus;

use crate::backend::OrderStats;
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::routes::account::OrderView;
use crate::services::flash::Flash;
use crate::state::AppState;

use super::{StatsView, token_rejected};

/// Order count for one status.
#[derive(Debug, Clone)]
pub struct StatusCount {
    pub status: &'static str,
    pub label: &'static str,
    pub count: u64,
}

/// Order statistics for the dashboard.
#[derive(Debug, Clone, Default)]
pub struct OrderStatsView {
    pub status_counts: Vec<StatusCount>,
    pub total_revenue: String,
    pub pending_revenue: String,
    pub recent_orders: Vec<OrderView>,
}

impl From<&OrderStats> for OrderStatsView {
    fn from(stats: &OrderStats) -> Self {
        Self {
            status_counts: OrderStatus::ALL
                .iter()
                .map(|status| StatusCount {
                    status: status.as_str(),
                    label: status.label(),
                    count: stats.count(*status),
                })
                .collect(),
            total_revenue: stats.total_revenue.display(),
            pending_revenue: stats.pending_revenue.display(),
            recent_orders: stats.recent_orders.iter().map(OrderView::from).collect(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardTemplate {
    pub ctx: PageContext,
    pub stats: StatsView,
    pub orders: OrderStatsView,
}

/// Store totals plus order statistics.
#[instrument(skip(state, session, admin, ctx))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    mut ctx: PageContext,
) -> Response {
    let backend = state.backend();
    let (stats, order_stats) = tokio::join!(
        backend.admin_stats(&admin.token),
        backend.order_stats(&admin.token)
    );

    let stats = match stats {
        Ok(stats) => StatsView::from(&stats),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, "Failed to load admin stats");
            ctx.flash_now(Flash::error(e.user_message()));
            StatsView::default()
        }
    };

    let orders = match order_stats {
        Ok(order_stats) => OrderStatsView::from(&order_stats),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, "Failed to load order stats");
            ctx.flash_now(Flash::error(e.user_message()));
            OrderStatsView::default()
        }
    };

    AdminDashboardTemplate { ctx, stats, orders }.into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_is_listed() {
        let stats: OrderStats = serde_json::from_value(serde_json::json!({
            "status_counts": {"pending": 3, "shipped": 1},
            "total_revenue": 120.5,
            "pending_revenue": 30,
            "recent_orders": []
        }))
        .unwrap();
        let view = OrderStatsView::from(&stats);
        assert_eq!(view.status_counts.len(), OrderStatus::ALL.len());
        let pending = view.status_counts.iter().find(|s| s.status == "pending").unwrap();
        assert_eq!(pending.count, 3);
        let paid = view.status_counts.iter().find(|s| s.status == "paid").unwrap();
        assert_eq!(paid.count, 0);
        assert_eq!(view.total_revenue, "R$ 120.50");
    }
}
