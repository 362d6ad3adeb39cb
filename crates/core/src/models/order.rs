use serde::{Deserialize, Serialize};

use crate::types::{OrderId, OrderItemId, OrderStatus, Price, ProductId, Timestamp, UserId};

/// A purchased line, priced at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: ProductId,
    pub product_name: String,
    pub product_price: Price,
    pub quantity: u32,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product_price * self.quantity
    }
}

/// The buyer, embedded in admin order listings.
///
/// The recent-orders summary omits the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUserSummary {
    #[serde(default)]
    pub id: Option<UserId>,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub total_amount: Price,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub shipping_address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<OrderUserSummary>,
}

impl Order {
    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |total, item| total.saturating_add(u64::from(item.quantity)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_admin_listing_with_user() {
        let order: Order = serde_json::from_str(
            r#"{
                "id": 12,
                "user_id": 3,
                "total_amount": 149.8,
                "status": "shipped",
                "created_at": "2024-04-02T08:00:00",
                "updated_at": null,
                "items": [
                    {"id": 1, "product_id": "arm-kit", "product_name": "Arm Kit", "product_price": 74.9, "quantity": 2}
                ],
                "user": {"id": 3, "username": "ada", "email": "ada@robots.io"}
            }"#,
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.items[0].line_total(), order.total_amount);
        assert_eq!(order.user.unwrap().username, "ada");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<Order, _> =
            serde_json::from_str(r#"{"id": 1, "total_amount": 1, "status": "lost"}"#);
        assert!(result.is_err());
    }
}
