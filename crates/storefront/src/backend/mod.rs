//! REST client for the store backend.
//!
//! # Architecture
//!
//! - The backend owns users, products, carts, orders and inventory; this
//!   module only issues HTTP calls and decodes the responses
//! - No caching, retries or batching: every call goes straight to the backend
//! - Authenticated calls send `Authorization: Bearer <token>`
//!
//! The backend has shipped two API generations that disagree on some response
//! shapes (wrapped vs. bare records, cart envelope vs. bare item list). The
//! decoders in [`types`] accept both.
//!
//! # Example
//!
//! ```rust,ignore
//! use robostore_storefront::backend::{BackendClient, ProductQuery};
//!
//! let client = BackendClient::new(&config.backend)?;
//! let page = client.list_products(&ProductQuery::storefront(), None).await?;
//! let cart = client.get_cart(&token).await?;
//! ```

mod client;
pub mod types;

pub use client::BackendClient;
pub use types::*;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Missing, invalid or expired bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (e.g. a consumer calling an admin endpoint).
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Response body did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl BackendError {
    /// Build the error for a non-success response.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_error_message(status, body);
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            _ => Self::Api {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Message suitable for showing to the visitor.
    ///
    /// Backend messages are passed through; transport and decode details are not.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. }
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message) => message.clone(),
            Self::Http(e) if e.is_timeout() => "The store service took too long to respond".to_string(),
            Self::Http(_) => "Could not reach the store service".to_string(),
            Self::Parse(_) => "Unexpected response from the store service".to_string(),
        }
    }

    /// Whether the backend rejected the bearer token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether this is a backend-side or transport failure rather than a
    /// rejection of the visitor's input.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::NotFound(_) => false,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Looks at `detail` (string, or a list of `{msg}` validation entries), then
/// `error`, then `message`; falls back to the status reason phrase.
#[must_use]
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| json.get(key).and_then(message_from_value))
        });

    from_body.unwrap_or_else(|| {
        status
            .canonical_reason()
            .map_or_else(|| format!("Request failed ({})", status.as_u16()), String::from)
    })
}

fn message_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(entries) => {
            let parts: Vec<&str> = entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .get("msg")
                        .and_then(serde_json::Value::as_str)
                        .or_else(|| entry.as_str())
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_prefers_detail() {
        let body = r#"{"detail": "Not enough stock", "error": "other"}"#;
        assert_eq!(
            extract_error_message(StatusCode::BAD_REQUEST, body),
            "Not enough stock"
        );
    }

    #[test]
    fn test_message_falls_back_to_error_then_message() {
        assert_eq!(
            extract_error_message(StatusCode::BAD_REQUEST, r#"{"error": "Cart is empty"}"#),
            "Cart is empty"
        );
        assert_eq!(
            extract_error_message(StatusCode::BAD_REQUEST, r#"{"message": "Nope"}"#),
            "Nope"
        );
    }

    #[test]
    fn test_message_joins_validation_entries() {
        let body = r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}, {"msg": "too short"}]}"#;
        assert_eq!(
            extract_error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "field required; too short"
        );
    }

    #[test]
    fn test_message_falls_back_to_status_text() {
        assert_eq!(
            extract_error_message(StatusCode::BAD_GATEWAY, "<html>oops</html>"),
            "Bad Gateway"
        );
        assert_eq!(
            extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail": ""}"#),
            "Internal Server Error"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            BackendError::from_response(StatusCode::UNAUTHORIZED, r#"{"detail": "Token expired"}"#),
            BackendError::Unauthorized(ref m) if m == "Token expired"
        ));
        assert!(matches!(
            BackendError::from_response(StatusCode::FORBIDDEN, "{}"),
            BackendError::Forbidden(_)
        ));
        assert!(matches!(
            BackendError::from_response(StatusCode::NOT_FOUND, r#"{"error": "Product not found"}"#),
            BackendError::NotFound(ref m) if m == "Product not found"
        ));
        let err = BackendError::from_response(StatusCode::CONFLICT, r#"{"error": "Email already exists"}"#);
        assert!(matches!(err, BackendError::Api { status: 409, .. }));
        assert_eq!(err.user_message(), "Email already exists");
        assert!(!err.is_server_side());
    }
}
