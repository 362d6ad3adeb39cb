//! Request ID middleware for request tracing and correlation.
//!
//! Each request carries an id that is recorded on the tracing span, tagged on
//! the Sentry scope, made available to handlers as a [`RequestId`] extension,
//! and echoed back in the `x-request-id` response header.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted as-is.
const MAX_UPSTREAM_ID_LEN: usize = 128;

/// The id assigned to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Use the upstream id if it is short printable ASCII, otherwise mint a UUID v4.
fn resolve_request_id(upstream: Option<&HeaderValue>) -> String {
    upstream
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| {
            !id.is_empty()
                && id.len() <= MAX_UPSTREAM_ID_LEN
                && id.bytes().all(|b| b.is_ascii_graphic())
        })
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = resolve_request_id(request.headers().get(REQUEST_ID_HEADER));

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_is_kept() {
        let value = HeaderValue::from_static("cf-1234");
        assert_eq!(resolve_request_id(Some(&value)), "cf-1234");
    }

    #[test]
    fn test_bad_upstream_id_is_replaced() {
        let long = HeaderValue::from_str(&"x".repeat(MAX_UPSTREAM_ID_LEN + 1)).unwrap();
        let spaced = HeaderValue::from_static("two words");
        for value in [None, Some(&long), Some(&spaced)] {
            let id = resolve_request_id(value);
            assert!(Uuid::parse_str(&id).is_ok(), "expected uuid, got {id}");
        }
    }
}
