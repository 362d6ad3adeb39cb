//! One-shot notices shown on the next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::models::session_keys;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    /// CSS modifier used by the templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Queue a flash for the next page render. Session failures are logged.
pub async fn push(session: &Session, flash: Flash) {
    let mut pending = session
        .get::<Vec<Flash>>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    pending.push(flash);

    if let Err(e) = session.insert(session_keys::FLASH, pending).await {
        tracing::error!(error = %e, "Failed to store flash message");
    }
}

/// Take every queued flash, leaving none behind.
///
/// A session with nothing queued is only read, so anonymous page views never
/// mark it as modified.
pub async fn take(session: &Session) -> Vec<Flash> {
    let pending = match session.get::<Vec<Flash>>(session_keys::FLASH).await {
        Ok(None) => return Vec::new(),
        Ok(Some(pending)) => pending,
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable flash messages");
            Vec::new()
        }
    };
    if let Err(e) = session.remove_value(session_keys::FLASH).await {
        tracing::error!(error = %e, "Failed to clear flash messages");
    }
    pending
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flashes_are_taken_once_in_order() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        push(&session, Flash::success("Added to cart")).await;
        push(&session, Flash::error("Out of stock")).await;

        let flashes = take(&session).await;
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].kind, FlashKind::Success);
        assert_eq!(flashes[1].message, "Out of stock");
        assert!(take(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_take_without_flashes_leaves_session_untouched() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        assert!(take(&session).await.is_empty());
        assert!(!session.is_modified());
    }

    #[tokio::test]
    async fn test_unreadable_flash_is_dropped() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session.insert(session_keys::FLASH, "garbage").await.unwrap();
        assert!(take(&session).await.is_empty());
        assert!(take(&session).await.is_empty());
    }
}
