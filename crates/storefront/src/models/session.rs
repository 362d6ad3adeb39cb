//! Session-related types.
//!
//! Types stored in the session for authentication state, the cart mirror and
//! one-shot flash messages.

use serde::{Deserialize, Serialize};

use robostore_core::User;

use crate::backend::AccessToken;

/// Session-stored authentication.
///
/// The token is what the backend checks; the user is a convenience copy used
/// for rendering and role checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token sent with every authenticated backend call.
    pub token: AccessToken,
    /// The logged-in user.
    pub user: User,
}

impl AuthSession {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Session keys.
pub mod keys {
    /// Key for the current [`AuthSession`](super::AuthSession).
    pub const AUTH: &str = "auth";

    /// Key for the mirror of the server-side cart.
    pub const CART: &str = "cart";

    /// Key for pending flash messages.
    pub const FLASH: &str = "flash";
}
