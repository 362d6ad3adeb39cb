//! Authentication service.
//!
//! Credentials are checked by the backend; this module validates forms
//! before sending them, turns the backend's token into an [`AuthSession`],
//! and keeps that session in the visitor's tower-sessions record.
//!
//! # Session lifecycle
//!
//! - [`login`] stores a token (plus the user, when the backend returned one)
//! - [`restore`] runs on every request and drops sessions whose token no
//!   longer decodes or has expired (with an early-expiry margin)
//! - [`logout`] removes the session

mod error;
pub mod token;

pub use error::AuthError;
pub use token::{TokenClaims, TokenError, decode_claims};

use std::time::Duration;

use chrono::{DateTime, Utc};
use tower_sessions::Session;

use robostore_core::{Email, User};

use crate::backend::{AccessToken, AuthResponse, BackendClient, ProfileUpdate};
use crate::models::{AuthSession, session_keys};

/// Minimum password length accepted by the forms.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Authentication service.
///
/// Wraps the backend's auth endpoints with local form validation.
pub struct AuthService<'a> {
    backend: &'a BackendClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(backend: &'a BackendClient) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `MissingField` for bad input, and
    /// `AuthError::Backend` when the backend rejects the credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;
        if password.is_empty() {
            return Err(AuthError::MissingField("Password"));
        }

        let response = self.backend.login(email.as_str(), password).await?;
        session_from_response(response)
    }

    /// Create an account and log it in.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any backend call when the form is
    /// incomplete, the email is malformed, or the passwords are weak or differ.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<AuthSession, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingField("Username"));
        }
        let email = Email::parse(email)?;
        validate_new_password(password, confirmation)?;

        let response = self
            .backend
            .register(username, email.as_str(), password)
            .await?;
        session_from_response(response)
    }

    /// Update username/email and optionally the password.
    ///
    /// Returns the updated user; the caller stores it with [`login`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for incomplete forms, and `AuthError::Backend`
    /// when the backend rejects the change (wrong current password, taken email).
    pub async fn update_profile(
        &self,
        auth: &AuthSession,
        change: &ProfileChange,
    ) -> Result<User, AuthError> {
        let update = change.validate()?;
        Ok(self.backend.update_profile(&auth.token, &update).await?)
    }
}

/// Edit-profile form input.
#[derive(Debug, Clone, Default)]
pub struct ProfileChange {
    pub username: String,
    pub email: String,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl ProfileChange {
    /// Check the form and build the backend request.
    ///
    /// A password change is requested only when `new_password` is filled in;
    /// it then needs the current password and a matching confirmation.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<ProfileUpdate, AuthError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingField("Username"));
        }
        let email = Email::parse(&self.email)?;

        let (current_password, new_password) = if self.new_password.is_empty() {
            (None, None)
        } else {
            if self.current_password.is_empty() {
                return Err(AuthError::MissingField("Current password"));
            }
            validate_new_password(&self.new_password, &self.confirm_password)?;
            (
                Some(self.current_password.clone()),
                Some(self.new_password.clone()),
            )
        };

        Ok(ProfileUpdate {
            username: username.to_string(),
            email: email.into(),
            current_password,
            new_password,
        })
    }
}

/// Validate a new password and its confirmation.
///
/// # Errors
///
/// Returns `PasswordMismatch` or `WeakPassword`.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if password != confirmation {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Build a session from a login/registration response.
///
/// # Errors
///
/// Returns `InvalidToken` if the response carries no user and the token's
/// claims cannot identify one.
pub fn session_from_response(response: AuthResponse) -> Result<AuthSession, AuthError> {
    build_session(response.access_token, response.user)
}

/// Pair a token with its user, reading the user from the token when absent.
///
/// # Errors
///
/// Returns `InvalidToken` when `user` is `None` and the token cannot be decoded.
pub fn build_session(token: AccessToken, user: Option<User>) -> Result<AuthSession, AuthError> {
    let user = match user {
        Some(user) => user,
        None => decode_claims(token.expose())
            .and_then(|claims| claims.to_user())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?,
    };
    Ok(AuthSession { token, user })
}

// =============================================================================
// Session Persistence
// =============================================================================

/// Store a token (and user) as the visitor's session.
///
/// Fails silently: problems are logged and `None` is returned, leaving the
/// visitor logged out.
pub async fn login(session: &Session, token: AccessToken, user: Option<User>) -> Option<AuthSession> {
    let auth = match build_session(token, user) {
        Ok(auth) => auth,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding login with undecodable token");
            return None;
        }
    };

    // New identity, new session id.
    if let Err(e) = session.cycle_id().await {
        tracing::error!(error = %e, "Failed to rotate session id");
        return None;
    }
    if let Err(e) = session.insert(session_keys::AUTH, &auth).await {
        tracing::error!(error = %e, "Failed to store auth session");
        return None;
    }

    crate::error::set_sentry_user(&auth.user.id, Some(&auth.user.email));
    Some(auth)
}

/// Remove the visitor's auth session.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn logout(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove_value(session_keys::AUTH).await?;
    crate::error::clear_sentry_user();
    Ok(())
}

/// Read the visitor's session, dropping it if it is no longer valid.
pub async fn restore(session: &Session, margin: Duration) -> Option<AuthSession> {
    restore_at(session, margin, Utc::now()).await
}

/// [`restore`] with an explicit clock.
pub async fn restore_at(
    session: &Session,
    margin: Duration,
    now: DateTime<Utc>,
) -> Option<AuthSession> {
    let stored = match session.get::<AuthSession>(session_keys::AUTH).await {
        Ok(Some(auth)) => auth,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable auth session, clearing");
            discard(session).await;
            return None;
        }
    };

    match decode_claims(stored.token.expose()) {
        Ok(claims) if claims.is_expired_at(now, margin) => {
            tracing::info!(user_id = %stored.user.id, "Session token expired, logging out");
            discard(session).await;
            None
        }
        Ok(_) => Some(stored),
        Err(e) => {
            tracing::warn!(error = %e, "Stored token no longer decodes, clearing");
            discard(session).await;
            None
        }
    }
}

/// Drop auth and the cart mirror that belonged to it.
async fn discard(session: &Session) {
    for key in [session_keys::AUTH, session_keys::CART] {
        if let Err(e) = session.remove_value(key).await {
            tracing::error!(error = %e, key, "Failed to clear session key");
        }
    }
}
