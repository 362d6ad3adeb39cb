use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, Timestamp};

fn default_true() -> bool {
    true
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
}

impl Product {
    /// Whether at least `quantity` units can be ordered.
    #[must_use]
    pub const fn is_in_stock(&self, quantity: i64) -> bool {
        self.is_active && self.stock_quantity >= quantity
    }

    #[must_use]
    pub const fn is_low_stock(&self, threshold: i64) -> bool {
        self.stock_quantity <= threshold
    }

    /// Case-insensitive match of `query` against name, description and category.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(self.name.as_str()),
            self.description.as_deref(),
            Some(self.category.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}
