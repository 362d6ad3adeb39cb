//! Robostore storefront library.
//!
//! Server-rendered store front and admin console over the Robostore REST
//! backend. The binary in `main.rs` wires configuration, logging and Sentry
//! around [`app`]; the integration tests drive the same router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware::from_fn, routing::get};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router with its middleware stack.
///
/// The stack is listed outermost first, matching [`middleware`].
pub fn app(state: AppState) -> Router {
    let static_dir = ServeDir::new(&state.config().static_dir);
    let stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::request_id_middleware))
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(middleware::create_session_layer(state.config()));

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .nest_service("/static", static_dir)
        .layer(stack)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness check. Does not call the backend.
async fn health() -> &'static str {
    "ok"
}
