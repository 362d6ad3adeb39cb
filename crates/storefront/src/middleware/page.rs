//! Per-page layout data.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use robostore_core::User;

use crate::middleware::auth::resolve_auth;
use crate::services::{cart, flash};
use crate::services::flash::Flash;
use crate::state::AppState;

/// What the shared layout needs: who is logged in, the cart badge count and
/// any pending flash messages.
///
/// Extracting it consumes the pending flashes, so only handlers that render
/// a page should ask for it.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<User>,
    pub cart_count: u64,
    pub flashes: Vec<Flash>,
}

impl PageContext {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(User::is_admin)
    }

    /// Add a flash that shows on this render only.
    pub fn flash_now(&mut self, flash: Flash) {
        self.flashes.push(flash);
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = resolve_auth(parts, state).await;
        let Some(session) = parts.extensions.get::<Session>().cloned() else {
            return Ok(Self::default());
        };

        let cart_count = if auth.is_some() {
            cart::mirror(&session).await.total_items()
        } else {
            0
        };

        Ok(Self {
            user: auth.map(|auth| auth.user),
            cart_count,
            flashes: flash::take(&session).await,
        })
    }
}
