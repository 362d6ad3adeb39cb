//! Store (catalog) route handler.
//!
//! The backend only filters by category, so the whole active catalog is
//! fetched in one page and narrowed here.

use std::collections::BTreeSet;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use robostore_core::{Price, Product};

use crate::backend::ProductQuery;
use crate::error::AppError;
use crate::filters;
use crate::middleware::PageContext;
use crate::routes::products::ProductView;
use crate::state::AppState;

/// Category value meaning "no category filter".
pub const ALL_CATEGORIES: &str = "all";

/// Store filter query parameters.
///
/// Values come straight from a GET form, so empty strings mean "unset".
#[derive(Debug, Default, Deserialize)]
pub struct StoreQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

/// Parsed filter.
#[derive(Debug, Default)]
pub struct StoreFilter {
    pub category: Option<String>,
    pub text: Option<String>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl From<&StoreQuery> for StoreFilter {
    /// Unparseable prices are ignored rather than rejected.
    fn from(query: &StoreQuery) -> Self {
        Self {
            category: non_empty(query.category.as_ref())
                .filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORIES))
                .map(String::from),
            text: non_empty(query.q.as_ref()).map(String::from),
            min_price: non_empty(query.min_price.as_ref()).and_then(|p| p.parse().ok()),
            max_price: non_empty(query.max_price.as_ref()).and_then(|p| p.parse().ok()),
        }
    }
}

impl StoreFilter {
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|category| product.category.eq_ignore_ascii_case(category));
        let text_ok = self
            .text
            .as_deref()
            .is_none_or(|text| product.matches_query(text));
        let min_ok = self.min_price.is_none_or(|min| product.price >= min);
        let max_ok = self.max_price.is_none_or(|max| product.price <= max);
        category_ok && text_ok && min_ok && max_ok
    }
}

/// Sorted distinct categories, prefixed by [`ALL_CATEGORIES`].
#[must_use]
pub fn categories(products: &[Product]) -> Vec<String> {
    let distinct: BTreeSet<&str> = products
        .iter()
        .map(|p| p.category.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    std::iter::once(ALL_CATEGORIES)
        .chain(distinct)
        .map(String::from)
        .collect()
}

/// Store page template.
#[derive(Template, WebTemplate)]
#[template(path = "store.html")]
pub struct StoreTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductView>,
    pub categories: Vec<String>,
    pub selected_category: String,
    pub q: String,
    pub min_price: String,
    pub max_price: String,
    pub total: usize,
}

/// Display the store with filters applied.
#[instrument(skip(state, ctx))]
pub async fn index(
    State(state): State<AppState>,
    ctx: PageContext,
    Query(query): Query<StoreQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .backend()
        .list_products(&ProductQuery::storefront(), None)
        .await?;

    let filter = StoreFilter::from(&query);
    let products: Vec<ProductView> = page
        .items
        .iter()
        .filter(|product| filter.matches(product))
        .map(ProductView::from)
        .collect();

    Ok(StoreTemplate {
        ctx,
        total: products.len(),
        products,
        categories: categories(&page.items),
        selected_category: filter
            .category
            .unwrap_or_else(|| ALL_CATEGORIES.to_string()),
        q: query.q.unwrap_or_default(),
        min_price: query.min_price.unwrap_or_default(),
        max_price: query.max_price.unwrap_or_default(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use robostore_core::ProductId;

    use super::*;

    fn product(id: &str, category: &str, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("{id} unit"),
            price: Price::from_cents(cents),
            category: category.to_string(),
            description: Some("Industrial grade".to_string()),
            image_url: None,
            stock_quantity: 5,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn query(category: &str, q: &str, min: &str, max: &str) -> StoreQuery {
        StoreQuery {
            category: Some(category.to_string()),
            q: Some(q.to_string()),
            min_price: Some(min.to_string()),
            max_price: Some(max.to_string()),
        }
    }

    #[test]
    fn test_empty_form_matches_everything() {
        let filter = StoreFilter::from(&query("all", "", "", ""));
        assert!(filter.category.is_none());
        assert!(filter.matches(&product("servo", "arms", 100)));
    }

    #[test]
    fn test_filters_combine() {
        let catalog = [
            product("servo", "arms", 5_000),
            product("gripper", "arms", 15_000),
            product("lidar", "sensors", 9_000),
        ];
        let filter = StoreFilter::from(&query("Arms", "", "60", "200,00"));
        let names: Vec<_> = catalog
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(names, ["gripper"]);

        let filter = StoreFilter::from(&query("", "LIDAR", "", ""));
        assert!(filter.matches(&catalog[2]));
        assert!(!filter.matches(&catalog[0]));
    }

    #[test]
    fn test_bad_price_is_ignored() {
        let filter = StoreFilter::from(&query("", "", "cheap", ""));
        assert!(filter.min_price.is_none());
    }

    #[test]
    fn test_categories_sorted_with_all_first() {
        let catalog = [
            product("a", "sensors", 1),
            product("b", "arms", 1),
            product("c", "sensors", 1),
            product("d", "", 1),
        ];
        assert_eq!(categories(&catalog), ["all", "arms", "sensors"]);
    }
}
