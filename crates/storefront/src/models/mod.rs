//! Storefront-local models.
//!
//! Backend entities live in `robostore_core`; this module only holds what the
//! storefront keeps in its own session.

pub mod session;

pub use session::{AuthSession, keys as session_keys};
