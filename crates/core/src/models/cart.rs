use serde::{Deserialize, Serialize};

use crate::types::{CartItemId, Price, ProductId, Timestamp, UserId};

/// One line of a user's cart.
///
/// The product name and price are snapshots taken when the item was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub added_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product_price * self.quantity
    }
}

/// A user's cart.
///
/// Totals are always derived from the items rather than trusted from the
/// wire, so a cart decoded from either backend response shape agrees with
/// itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Most units of one product a single cart line may hold.
    pub const MAX_LINE_QUANTITY: u32 = 99;

    #[must_use]
    pub const fn empty() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub const fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |total, item| total.saturating_add(u64::from(item.quantity)))
    }

    /// Units of `product_id` already in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.items
            .iter()
            .filter(|item| &item.product_id == product_id)
            .fold(0, |total, item| total.saturating_add(item.quantity))
    }

    #[must_use]
    pub fn total_amount(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn find(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }
}
