//! Bearer token inspection.
//!
//! The storefront never verifies signatures (the backend does that on every
//! call). It only reads the payload to learn who the token belongs to and
//! when it stops being worth sending.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use robostore_core::{Role, User, UserId};

/// Errors decoding a token payload.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not JSON claims: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token has no usable subject")]
    MissingSubject,
}

/// JWT `sub`; backends emit it as either a string or a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Subject {
    Id(i64),
    Text(String),
}

/// Claims the storefront cares about. Unknown claims are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<Subject>,
    /// Expiry as seconds since the Unix epoch. Absent means no client-side expiry.
    #[serde(default)]
    pub exp: Option<serde_json::Number>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl TokenClaims {
    /// Expiry in whole seconds, if the token carries one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // fractional exp values are truncated on purpose
    pub fn expires_at(&self) -> Option<i64> {
        let exp = self.exp.as_ref()?;
        exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
    }

    /// Whether the token should be treated as expired at `now`.
    ///
    /// A token counts as expired `margin` before its real `exp`, so a page
    /// never starts a backend call with a token that dies mid-request.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let Some(exp) = self.expires_at() else {
            return false;
        };
        let margin = i64::try_from(margin.as_secs()).unwrap_or(i64::MAX);
        now.timestamp().saturating_add(margin) >= exp
    }

    /// Numeric user id from `sub`.
    ///
    /// # Errors
    ///
    /// Returns `MissingSubject` when `sub` is absent or not an integer.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        match &self.sub {
            Some(Subject::Id(id)) => Ok(UserId::new(*id)),
            Some(Subject::Text(text)) => text
                .parse::<UserId>()
                .map_err(|_| TokenError::MissingSubject),
            None => Err(TokenError::MissingSubject),
        }
    }

    /// Build the session user from the claims alone.
    ///
    /// # Errors
    ///
    /// Returns `MissingSubject` when the token does not identify a user.
    pub fn to_user(&self) -> Result<User, TokenError> {
        let email = self.email.clone().unwrap_or_default();
        let username = self
            .username
            .clone()
            .or_else(|| email.split('@').next().map(String::from))
            .unwrap_or_default();
        let role = self
            .role
            .as_deref()
            .and_then(|role| role.parse::<Role>().ok())
            .unwrap_or_default();

        Ok(User {
            id: self.user_id()?,
            username,
            email,
            role,
            created_at: None,
            avatar_url: None,
        })
    }
}

/// Decode the claims of a JWT without verifying it.
///
/// Padding on the payload segment is tolerated.
///
/// # Errors
///
/// Returns a [`TokenError`] when the token is not a decodable JWT.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut parts = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Build an unsigned JWT with the given claims.
    pub(crate) fn make_token(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_decode_claims() {
        let token = make_token(&serde_json::json!({
            "sub": "42", "exp": 2_000_000_000, "role": "admin", "email": "ada@robots.io"
        }));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.expires_at(), Some(2_000_000_000));

        let user = claims.to_user().unwrap();
        assert!(user.is_admin());
        assert_eq!(user.username, "ada");
    }

    #[test]
    fn test_decode_tolerates_padding_and_numeric_sub() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        // 16 bytes of JSON encodes with `==` under the padded alphabet.
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"sub":7,"ab":1}"#);
        assert!(payload.ends_with('='));
        let claims = decode_claims(&format!("{header}.{payload}.sig")).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(7));
        assert_eq!(claims.to_user().unwrap().role, Role::Consumer);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_claims("not-a-jwt"), Err(TokenError::Malformed)));
        assert!(matches!(decode_claims("a.b.c.d"), Err(TokenError::Malformed)));
        assert!(matches!(decode_claims("a.!!!.c"), Err(TokenError::Base64(_))));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode(b"hello"));
        assert!(matches!(decode_claims(&not_json), Err(TokenError::Json(_))));
    }

    #[test]
    fn test_missing_subject_cannot_build_user() {
        let claims = decode_claims(&make_token(&serde_json::json!({"exp": 1}))).unwrap();
        assert!(matches!(claims.to_user(), Err(TokenError::MissingSubject)));
    }

    #[test]
    fn test_expiry_applies_margin() {
        let claims = decode_claims(&make_token(&serde_json::json!({"sub": "1", "exp": 1_000}))).unwrap();
        let margin = Duration::from_secs(300);

        assert!(!claims.is_expired_at(at(600), margin));
        assert!(claims.is_expired_at(at(700), margin));
        assert!(!claims.is_expired_at(at(999), Duration::ZERO));
        assert!(claims.is_expired_at(at(1_000), Duration::ZERO));
    }

    #[test]
    fn test_no_exp_never_expires() {
        let claims = decode_claims(&make_token(&serde_json::json!({"sub": "1"}))).unwrap();
        assert!(!claims.is_expired_at(at(i64::from(i32::MAX)), Duration::from_secs(300)));
    }

    #[test]
    fn test_fractional_exp() {
        let claims =
            decode_claims(&make_token(&serde_json::json!({"sub": "1", "exp": 1_000.75}))).unwrap();
        assert_eq!(claims.expires_at(), Some(1_000));
    }
}
