//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::instrument;

use robostore_core::{Cart, Product, ProductId};

use crate::backend::BackendError;
use crate::error::AppError;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Product display data for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub url: String,
    pub name: String,
    pub price: String,
    pub category: String,
    pub description: String,
    pub image_url: Option<String>,
    pub stock_quantity: i64,
    /// Upper bound for the add-to-cart quantity input.
    pub max_quantity: i64,
    pub in_stock: bool,
    pub is_active: bool,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            url: format!("/products/{}", urlencoding::encode(product.id.as_str())),
            name: product.name.clone(),
            price: product.price.display(),
            category: product.category.clone(),
            description: product.description.clone().unwrap_or_default(),
            image_url: product.image_url.clone().filter(|url| !url.is_empty()),
            stock_quantity: product.stock_quantity,
            max_quantity: product
                .stock_quantity
                .clamp(1, i64::from(Cart::MAX_LINE_QUANTITY)),
            in_stock: product.is_in_stock(1),
            is_active: product.is_active,
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub ctx: PageContext,
    pub product: ProductView,
}

/// Display product detail page.
#[instrument(skip(state, ctx))]
pub async fn show(
    State(state): State<AppState>,
    ctx: PageContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = match state.backend().get_product(&ProductId::new(id)).await {
        Ok(product) if product.is_active => product,
        Ok(_) | Err(BackendError::NotFound(_)) => {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(ProductShowTemplate {
        ctx,
        product: ProductView::from(&product),
    })
}
