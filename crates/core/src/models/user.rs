use serde::{Deserialize, Serialize};

use crate::types::{Role, Timestamp, UserId};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Name shown in the header and greetings.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_minimal_user() {
        let user: User = serde_json::from_str(
            r#"{"id": 3, "username": "ada", "email": "ada@robots.io", "role": "admin", "created_at": null}"#,
        )
        .unwrap();
        assert!(user.is_admin());
        assert!(user.created_at.is_none());
        assert!(user.avatar_url.is_none());
    }

    #[test]
    fn test_missing_role_defaults_to_consumer() {
        let user: User =
            serde_json::from_str(r#"{"id": 1, "username": "", "email": "x@y.z"}"#).unwrap();
        assert_eq!(user.role, Role::Consumer);
        assert_eq!(user.display_name(), "x@y.z");
    }
}
