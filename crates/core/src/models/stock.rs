use serde::{Deserialize, Serialize};

use crate::types::{MovementType, ProductId, StockMovementId, Timestamp, UserId};

/// An entry in a product's inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    /// Units moved; always non-negative, direction is `movement_type`.
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl StockMovement {
    /// Signed change in stock level.
    #[must_use]
    pub const fn delta(&self) -> i64 {
        match self.movement_type {
            MovementType::In => self.quantity,
            MovementType::Out => -self.quantity,
        }
    }
}
