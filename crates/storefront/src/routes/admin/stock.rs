//! Admin inventory: stock levels, adjustments, the movement ledger and
//! product creation.

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

use robostore_core::{Price, Product, ProductId, StockMovement};

use crate::backend::{BackendError, NewProduct, ProductQuery, StockAdjustment};
use crate::error::AppError;
use crate::filters;
use crate::middleware::{PageContext, RequireAdmin};
use crate::routes::cart::safe_return_path;
use crate::routes::products::ProductView;
use crate::routes::{PageParam, Pagination, SelectOption, redirect_with_flash};
use crate::services::flash::Flash;
use crate::state::AppState;

use super::{finish, token_rejected};

/// Products per page on the inventory list.
const PRODUCTS_PER_PAGE: u32 = 10;

/// Reasons offered for a manual stock change.
pub const STOCK_REASONS: [SelectOption; 4] = [
    SelectOption {
        value: "adjustment",
        label: "Adjustment",
    },
    SelectOption {
        value: "restock",
        label: "Restock",
    },
    SelectOption {
        value: "return",
        label: "Return",
    },
    SelectOption {
        value: "damage",
        label: "Damaged",
    },
];

const DEFAULT_REASON: &str = "adjustment";

// =============================================================================
// Inventory
// =============================================================================

/// Inventory row.
#[derive(Debug, Clone)]
pub struct StockRow {
    pub product: ProductView,
    pub movements_url: String,
    pub adjust_url: String,
    pub is_low: bool,
}

impl StockRow {
    fn new(product: &Product, threshold: i64) -> Self {
        let id = urlencoding::encode(product.id.as_str());
        Self {
            product: ProductView::from(product),
            movements_url: format!("/admin/stock/{id}/movements"),
            adjust_url: format!("/admin/stock/{id}"),
            is_low: product.is_low_stock(threshold),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/stock.html")]
pub struct StockTemplate {
    pub ctx: PageContext,
    pub rows: Vec<StockRow>,
    pub low_stock: Vec<StockRow>,
    pub threshold: i64,
    pub pager: Pagination,
    pub reasons: Vec<SelectOption>,
    pub return_to: String,
}

/// Inventory list with the low-stock report.
#[instrument(skip(state, session, admin, ctx))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    mut ctx: PageContext,
    Query(params): Query<PageParam>,
) -> Response {
    let threshold = state.config().low_stock_threshold;
    let query = ProductQuery::inventory(params.page(), PRODUCTS_PER_PAGE);

    let backend = state.backend();
    let (products, low_stock) = tokio::join!(
        backend.list_products(&query, Some(&admin.token)),
        backend.low_stock(&admin.token, threshold)
    );

    let (rows, pager) = match products {
        Ok(page) => (
            page.items
                .iter()
                .map(|product| StockRow::new(product, threshold))
                .collect(),
            Pagination::from(&page),
        ),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, "Failed to load inventory");
            ctx.flash_now(Flash::error(e.user_message()));
            (Vec::new(), Pagination::default())
        }
    };

    let low_stock = match low_stock {
        Ok(report) => report
            .products
            .iter()
            .map(|product| StockRow::new(product, threshold))
            .collect(),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return redirect.into_response();
            }
            tracing::warn!(error = %e, "Failed to load low-stock report");
            Vec::new()
        }
    };

    StockTemplate {
        ctx,
        rows,
        low_stock,
        threshold,
        return_to: format!("/admin/stock?page={}", pager.current_page),
        pager,
        reasons: STOCK_REASONS.to_vec(),
    }
    .into_response()
}

// =============================================================================
// Movements
// =============================================================================

/// Ledger entry display data.
#[derive(Debug, Clone)]
pub struct MovementView {
    pub date: String,
    pub direction: &'static str,
    /// Signed change, e.g. `+5` or `-2`.
    pub change: String,
    pub reason: String,
    pub reference: String,
}

impl From<&StockMovement> for MovementView {
    fn from(movement: &StockMovement) -> Self {
        Self {
            date: movement
                .created_at
                .as_ref()
                .map(|at| at.date_time())
                .unwrap_or_default(),
            direction: movement.movement_type.as_str(),
            change: format!("{:+}", movement.delta()),
            reason: movement.reason.clone().unwrap_or_default(),
            reference: movement.reference_id.clone().unwrap_or_default(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "admin/movements.html")]
pub struct MovementsTemplate {
    pub ctx: PageContext,
    pub product: StockRow,
    pub movements: Vec<MovementView>,
    pub pager: Pagination,
    pub pager_base: String,
    pub reasons: Vec<SelectOption>,
    pub return_to: String,
}

/// Stock ledger for one product.
#[instrument(skip(state, session, admin, ctx))]
pub async fn movements(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    mut ctx: PageContext,
    Path(id): Path<String>,
    Query(params): Query<PageParam>,
) -> Result<Response, AppError> {
    let id = ProductId::new(id);
    let threshold = state.config().low_stock_threshold;

    let backend = state.backend();
    let (product, movements) = tokio::join!(
        backend.get_product(&id),
        backend.stock_movements(&admin.token, &id, params.page())
    );

    let product = match product {
        Ok(product) => product,
        Err(BackendError::NotFound(_)) => return Err(AppError::NotFound("Product".to_string())),
        Err(e) => return Err(e.into()),
    };

    let (movements, pager) = match movements {
        Ok(page) => (
            page.items.iter().map(MovementView::from).collect(),
            Pagination::from(&page),
        ),
        Err(e) => {
            if let Some(redirect) = token_rejected(&session, &e).await {
                return Ok(redirect.into_response());
            }
            tracing::warn!(error = %e, product_id = %id, "Failed to load stock movements");
            ctx.flash_now(Flash::error(e.user_message()));
            (Vec::new(), Pagination::default())
        }
    };

    let product = StockRow::new(&product, threshold);
    Ok(MovementsTemplate {
        ctx,
        return_to: product.movements_url.clone(),
        pager_base: format!("{}?", product.movements_url),
        product,
        movements,
        pager,
        reasons: STOCK_REASONS.to_vec(),
    }
    .into_response())
}

// =============================================================================
// Adjustments
// =============================================================================

/// Stock change form data. `quantity` is a signed delta.
#[derive(Debug, Deserialize)]
pub struct AdjustStockForm {
    pub quantity: i64,
    pub reason: Option<String>,
    pub return_to: Option<String>,
}

impl AdjustStockForm {
    /// Build the request body.
    ///
    /// # Errors
    ///
    /// Returns the message to flash for a zero delta or an unknown reason.
    pub fn validate(&self) -> Result<StockAdjustment, String> {
        if self.quantity == 0 {
            return Err("Quantity must not be zero".to_string());
        }
        let reason = self
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_REASON);
        if !STOCK_REASONS.iter().any(|option| option.value == reason) {
            return Err(format!("Invalid reason: {reason}"));
        }
        Ok(StockAdjustment {
            quantity: self.quantity,
            reason: reason.to_string(),
        })
    }
}

/// Apply a signed stock change to a product.
#[instrument(skip(state, session, admin))]
pub async fn adjust(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    Form(form): Form<AdjustStockForm>,
) -> Redirect {
    let to = safe_return_path(form.return_to.as_deref(), "/admin/stock");
    let id = ProductId::new(id);

    let adjustment = match form.validate() {
        Ok(adjustment) => adjustment,
        Err(message) => return redirect_with_flash(&session, Flash::error(message), &to).await,
    };

    let result = state
        .backend()
        .adjust_stock(&admin.token, &id, &adjustment)
        .await;
    if let Ok(update) = &result {
        tracing::info!(
            product_id = %id,
            old_stock = update.old_stock,
            new_stock = update.new_stock,
            reason = %adjustment.reason,
            "Stock adjusted"
        );
    }
    finish(
        &session,
        result,
        |update| {
            format!(
                "Stock for {id} changed from {} to {}",
                update.old_stock, update.new_stock
            )
        },
        &to,
    )
    .await
}

// =============================================================================
// Product creation
// =============================================================================

/// New product form data.
#[derive(Debug, Default, Deserialize)]
pub struct NewProductForm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub stock_quantity: String,
    /// Checkbox; present when ticked.
    pub is_active: Option<String>,
}

impl NewProductForm {
    /// Check the fields and build the request body.
    ///
    /// # Errors
    ///
    /// Returns the message to flash for the first invalid field.
    pub fn validate(&self) -> Result<NewProduct, String> {
        let required = [
            ("Product id", &self.id),
            ("Name", &self.name),
            ("Category", &self.category),
            ("Price", &self.price),
        ];
        if let Some((label, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("{label} is required"));
        }

        let price = Price::from_str(&self.price)
            .ok()
            .filter(|price| *price > Price::ZERO)
            .ok_or_else(|| format!("Invalid price: {}", self.price.trim()))?;

        let stock = self.stock_quantity.trim();
        let stock_quantity = if stock.is_empty() {
            0
        } else {
            stock
                .parse::<i64>()
                .ok()
                .filter(|quantity| *quantity >= 0)
                .ok_or_else(|| format!("Invalid stock quantity: {stock}"))?
        };

        Ok(NewProduct {
            id: ProductId::new(self.id.trim()),
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
            price,
            category: self.category.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
            stock_quantity,
            is_active: self.is_active.is_some(),
        })
    }
}

/// Create a product.
#[instrument(skip(state, session, admin, form))]
pub async fn create_product(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<NewProductForm>,
) -> Redirect {
    const BACK: &str = "/admin/stock";

    let product = match form.validate() {
        Ok(product) => product,
        Err(message) => return redirect_with_flash(&session, Flash::error(message), BACK).await,
    };

    let result = state
        .backend()
        .create_product(&admin.token, &product)
        .await;
    if let Ok(created) = &result {
        tracing::info!(product_id = %created.id, "Product created");
    }
    finish(
        &session,
        result,
        |created| format!("Product {} created", created.name),
        BACK,
    )
    .await
}
