//! Robostore storefront - store front and admin console.
//!
//! Serves server-rendered pages on port 3000 by default. All data lives in
//! the external REST backend (`BACKEND_API_URL`); this process keeps only
//! per-visitor sessions in memory.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::borrow::Cow;

use robostore_storefront::app;
use robostore_storefront::config::{SentryConfig, StorefrontConfig};
use robostore_storefront::state::AppState;
use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "robostore_storefront=info,tower_http=debug";

/// Start Sentry when a DSN is configured. The guard flushes events on drop.
fn init_sentry(sentry: &SentryConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = sentry.dsn.as_deref()?;
    let options = sentry::ClientOptions {
        release: sentry::release_name!(),
        environment: sentry.environment.clone().map(Cow::Owned),
        sample_rate: sentry.sample_rate,
        traces_sample_rate: sentry.traces_sample_rate,
        attach_stacktrace: true,
        ..Default::default()
    };
    Some(sentry::init((dsn, options)))
}

/// Warnings and errors become Sentry events; info and debug ride along as breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> EventFilter {
    match *metadata.level() {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        Level::TRACE => EventFilter::Ignore,
    }
}

/// `RUST_LOG` wins over [`DEFAULT_LOG_FILTER`].
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let config = StorefrontConfig::from_env().expect("Invalid storefront configuration");

    // Sentry first, so the tracing layer has a client to report to.
    let sentry_guard = init_sentry(&config.sentry);
    init_tracing();
    if sentry_guard.is_some() {
        tracing::info!("Sentry error tracking enabled");
    }

    tracing::info!(
        backend = ?config.backend,
        expiry_margin_secs = config.auth_expiry_margin.as_secs(),
        low_stock_threshold = config.low_stock_threshold,
        "Robostore storefront configured"
    );

    let addr = config.socket_addr();
    let state = AppState::new(config).expect("Could not build the backend client");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Could not bind the storefront address");
    tracing::info!(%addr, "Storefront listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Storefront server failed");
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Could not listen for Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down, draining open requests");
}
