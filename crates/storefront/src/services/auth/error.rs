//! Authentication error types.

use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] robostore_core::EmailError),

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// A required form field was left empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The backend issued a token that cannot be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The backend rejected the request.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AuthError {
    /// Message suitable for showing next to the form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend(err) => err.user_message(),
            Self::InvalidToken(_) | Self::Session(_) => {
                "Could not start your session, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}
