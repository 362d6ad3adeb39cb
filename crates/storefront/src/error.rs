//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. Page handlers return `Result<T, AppError>`;
//! form handlers flash backend messages instead and only use `AppError` for
//! failures they cannot recover from.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::backend::BackendError;
use crate::filters;
use crate::middleware::PageContext;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Visitor is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Visitor is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Internal(format!("session: {err}"))
    }
}

/// Error page.
#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub ctx: PageContext,
    pub status: u16,
    pub message: String,
}

impl AppError {
    /// The underlying backend error, if any.
    const fn backend(&self) -> Option<&BackendError> {
        match self {
            Self::Backend(e)
            | Self::Cart(CartError::Backend(e))
            | Self::Auth(AuthError::Backend(e)) => Some(e),
            _ => None,
        }
    }

    fn is_server_side(&self) -> bool {
        match self {
            Self::Internal(_) | Self::Auth(AuthError::Session(_)) => true,
            _ => self.backend().is_some_and(BackendError::is_server_side),
        }
    }

    fn status(&self) -> StatusCode {
        if let Some(err) = self.backend() {
            return match err {
                BackendError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                BackendError::Forbidden(_) => StatusCode::FORBIDDEN,
                BackendError::NotFound(_) => StatusCode::NOT_FOUND,
                BackendError::Api { status, .. } if *status < 500 => StatusCode::BAD_REQUEST,
                BackendError::Api { .. } | BackendError::Http(_) | BackendError::Parse(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
        }
        match self {
            Self::Cart(CartError::NotAuthenticated) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(AuthError::Session(_) | AuthError::InvalidToken(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the visitor. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Backend(e) => e.user_message(),
            Self::Cart(e) => e.user_message(),
            Self::Auth(e) => e.user_message(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(_) => "Please log in".to_string(),
            Self::Forbidden(_) => "You do not have access to this page".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_side() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        if status == StatusCode::UNAUTHORIZED {
            return Redirect::to("/login").into_response();
        }

        let page = ErrorTemplate {
            ctx: PageContext::default(),
            status: status.as_u16(),
            message: self.public_message(),
        };
        (status, page).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "arm-01")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::header::LOCATION;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Backend(BackendError::Api {
                status: 503,
                message: "down".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::Backend(BackendError::NotFound(
                "gone".to_string()
            )))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_unauthorized_redirects_to_login() {
        for err in [
            AppError::Unauthorized("test".to_string()),
            AppError::Cart(CartError::NotAuthenticated),
            AppError::Backend(BackendError::Unauthorized("expired".to_string())),
        ] {
            let response = err.into_response();
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers().get(LOCATION).unwrap(), "/login");
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = AppError::Internal("db password leaked".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Backend(BackendError::Api {
            status: 400,
            message: "Insufficient stock".to_string(),
        });
        assert_eq!(err.public_message(), "Insufficient stock");
    }
}
