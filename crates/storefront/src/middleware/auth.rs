//! Authentication extractors.
//!
//! The stored session is restored (and dropped if its token has expired) the
//! first time a request asks for it; the outcome is cached in the request
//! extensions so later extractors in the same request agree.

use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::AuthSession;
use crate::services::auth;
use crate::state::AppState;

/// Outcome of restoring the session for this request.
#[derive(Clone)]
struct ResolvedAuth(Option<AuthSession>);

/// Restore the visitor's auth session, at most once per request.
pub(crate) async fn resolve_auth(parts: &mut Parts, state: &AppState) -> Option<AuthSession> {
    if let Some(ResolvedAuth(resolved)) = parts.extensions.get::<ResolvedAuth>() {
        return resolved.clone();
    }

    let session = parts.extensions.get::<Session>()?.clone();
    let resolved = auth::restore(&session, state.config().auth_expiry_margin).await;

    if let Some(current) = &resolved {
        tracing::Span::current().record("user_id", current.user.id.as_i64());
        crate::error::set_sentry_user(&current.user.id, Some(&current.user.email));
    }

    parts.extensions.insert(ResolvedAuth(resolved.clone()));
    resolved
}

/// Login URL that returns to the current page after a successful login.
fn login_url(parts: &Parts) -> String {
    if parts.method != Method::GET {
        return "/login".to_string();
    }
    let target = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    format!("/login?next={}", urlencoding::encode(target))
}

/// Extractor that requires a logged-in visitor.
///
/// # Example
///
/// ```rust,ignore
/// async fn dashboard(RequireAuth(auth): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", auth.user.display_name())
/// }
/// ```
pub struct RequireAuth(pub AuthSession);

/// Extractor that requires an admin.
pub struct RequireAdmin(pub AuthSession);

/// Error returned when a route's access requirement is not met.
#[derive(Debug)]
pub enum AuthRejection {
    /// Anonymous visitor; redirect to the login page.
    RedirectToLogin(String),
    /// Logged in but not an admin.
    NotAdmin,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(url) => Redirect::to(&url).into_response(),
            Self::NotAdmin => Redirect::to("/dashboard").into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_auth(parts, state)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::RedirectToLogin(login_url(parts)))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(auth) = RequireAuth::from_request_parts(parts, state).await?;
        if !auth.is_admin() {
            tracing::warn!(user_id = %auth.user.id, path = %parts.uri.path(), "Non-admin denied");
            return Err(AuthRejection::NotAdmin);
        }
        Ok(Self(auth))
    }
}

/// Extractor that optionally gets the current auth session.
///
/// Unlike `RequireAuth`, this does not reject anonymous visitors.
pub struct OptionalAuth(pub Option<AuthSession>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve_auth(parts, state).await))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_login_url_keeps_page() {
        let parts = parts(Method::GET, "/store?category=arms&q=servo");
        assert_eq!(
            login_url(&parts),
            "/login?next=%2Fstore%3Fcategory%3Darms%26q%3Dservo"
        );
    }

    #[test]
    fn test_login_url_for_form_posts() {
        let parts = parts(Method::POST, "/cart/add");
        assert_eq!(login_url(&parts), "/login");
    }
}
