//! Advisory session cache.
//!
//! Holds the last session the controller saw, stamped with when it was
//! fetched. It is write-only from the controller's side and read only for
//! display; alert decisions always go back to the session store.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::Session;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedSession {
    pub session: Session,
    pub fetched_at: DateTime<Utc>,
}

impl CachedSession {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.fetched_at
    }
}

#[derive(Debug, Default)]
pub struct SessionCache {
    last: RwLock<Option<CachedSession>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a store read. `None` means the store reported
    /// no session, which clears the cache.
    pub async fn observe(&self, session: Option<&Session>, fetched_at: DateTime<Utc>) {
        *self.last.write().await = session.map(|s| CachedSession {
            session: s.clone(),
            fetched_at,
        });
    }

    pub async fn peek(&self) -> Option<CachedSession> {
        self.last.read().await.clone()
    }
}
