//! Session store backed by the `sessions` table

use super::{Session, SessionStore, StoreError};
use crate::db::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Sessions persisted as JSON rows, surviving restarts
#[derive(Clone)]
pub struct DatabaseSessionStore {
    db: Database,
    ttl: Duration,
}

impl DatabaseSessionStore {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    fn is_expired(&self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(updated_at)
            .to_std()
            .is_ok_and(|age| age >= self.ttl)
    }
}

#[async_trait]
impl SessionStore for DatabaseSessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError> {
        let Some(stored) = self.db.get_session(user_id)? else {
            return Ok(None);
        };

        if self.is_expired(stored.updated_at, Utc::now()) {
            tracing::debug!(user_id = %user_id, "Dropping expired session");
            self.db.delete_session(user_id)?;
            return Ok(None);
        }
        Ok(Some(stored.session))
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.db.put_session(session, Utc::now())?;
        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> Result<(), StoreError> {
        self.db.delete_session(user_id)?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| StoreError::Backend(format!("session ttl out of range: {e}")))?;
        Ok(self.db.delete_sessions_before(Utc::now() - ttl)?)
    }
}
