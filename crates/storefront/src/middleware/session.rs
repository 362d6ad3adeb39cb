//! Session middleware configuration.
//!
//! Sessions live in process memory and do not survive a restart. The store is
//! a bounded `moka` cache: idle sessions age out after the cookie's inactivity
//! window and the least recently used ones are evicted once the configured
//! capacity is reached.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tower_sessions::cookie::time::OffsetDateTime;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, SessionManagerLayer};

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "robostore_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// In-memory session store with a size cap and idle expiry.
#[derive(Clone)]
pub struct SessionCache {
    records: Cache<Id, Record>,
}

impl SessionCache {
    #[must_use]
    pub fn new(capacity: u64, idle: Duration) -> Self {
        let records = Cache::builder()
            .max_capacity(capacity)
            .time_to_idle(idle)
            .build();
        Self { records }
    }

    /// Sessions currently held. Eviction is lazy, so this may lag.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.records.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply pending evictions (tests read [`Self::len`] right after).
    pub async fn sync(&self) {
        self.records.run_pending_tasks().await;
    }
}

impl fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCache")
            .field("entries", &self.records.entry_count())
            .finish()
    }
}

#[async_trait]
impl SessionStore for SessionCache {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        while self.records.contains_key(&record.id) {
            record.id = Id::default();
        }
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.records.insert(record.id, record.clone()).await;
        Ok(())
    }

    async fn load(&self, id: &Id) -> session_store::Result<Option<Record>> {
        match self.records.get(id).await {
            Some(record) if record.expiry_date > OffsetDateTime::now_utc() => Ok(Some(record)),
            Some(_) => {
                self.records.invalidate(id).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &Id) -> session_store::Result<()> {
        self.records.invalidate(id).await;
        Ok(())
    }
}

/// Create the session layer over a bounded in-memory store.
#[must_use]
pub fn create_session_layer(config: &StorefrontConfig) -> SessionManagerLayer<SessionCache> {
    let idle = Duration::from_secs(SESSION_EXPIRY_SECONDS.unsigned_abs());
    SessionManagerLayer::new(SessionCache::new(config.session_capacity, idle))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use tower_sessions::cookie::time;

    use super::*;

    fn record(expires_in: time::Duration) -> Record {
        Record {
            id: Id::default(),
            data: HashMap::default(),
            expiry_date: OffsetDateTime::now_utc() + expires_in,
        }
    }

    fn store(capacity: u64) -> SessionCache {
        SessionCache::new(capacity, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = store(10);
        let mut rec = record(time::Duration::hours(1));
        store.create(&mut rec).await.unwrap();

        let loaded = store.load(&rec.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, rec.id);

        store.delete(&rec.id).await.unwrap();
        assert!(store.load(&rec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_is_dropped_on_load() {
        let store = store(10);
        let mut rec = record(time::Duration::seconds(-1));
        store.create(&mut rec).await.unwrap();

        assert!(store.load(&rec.id).await.unwrap().is_none());
        store.sync().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let store = store(5);
        for _ in 0..50 {
            let mut rec = record(time::Duration::hours(1));
            store.create(&mut rec).await.unwrap();
        }
        store.sync().await;
        assert!(store.len() <= 5, "held {} sessions", store.len());
    }
}
