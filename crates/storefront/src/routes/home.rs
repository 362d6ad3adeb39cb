//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::backend::ProductQuery;
use crate::filters;
use crate::middleware::PageContext;
use crate::routes::products::ProductView;
use crate::services::flash::Flash;
use crate::state::AppState;

/// Products shown on the home page.
const FEATURED_COUNT: usize = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    pub featured: Vec<ProductView>,
}

/// Display the home page.
///
/// A backend outage leaves the featured list empty rather than failing the page.
#[instrument(skip(state, ctx))]
pub async fn home(State(state): State<AppState>, mut ctx: PageContext) -> impl IntoResponse {
    let featured = match state
        .backend()
        .list_products(&ProductQuery::storefront(), None)
        .await
    {
        Ok(page) => page
            .items
            .iter()
            .take(FEATURED_COUNT)
            .map(ProductView::from)
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load featured products");
            ctx.flash_now(Flash::error(e.user_message()));
            Vec::new()
        }
    };

    HomeTemplate { ctx, featured }
}
