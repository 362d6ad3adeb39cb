//! Backend entities.
//!
//! These mirror the JSON records the backend service returns. Fields the
//! backend may omit or send as `null` are `Option` or `#[serde(default)]`
//! so that both of its API generations decode into the same types.

mod cart;
mod order;
mod product;
mod stock;
mod user;

pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem, OrderUserSummary};
pub use product::Product;
pub use stock::StockMovement;
pub use user::User;
