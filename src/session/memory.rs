//! Process-local session store

use super::{Session, SessionStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct Entry {
    session: Session,
    touched: Instant,
}

/// Session store kept in a mutex-guarded map; lost on restart
pub struct InMemorySessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.touched.elapsed() >= self.ttl
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError> {
        let mut entries = self.entries()?;
        match entries.get(user_id) {
            Some(entry) if self.is_expired(entry) => {
                entries.remove(user_id);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.session.clone())),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.entries()?.insert(
            session.user_id.clone(),
            Entry {
                session: session.clone(),
                touched: Instant::now(),
            },
        );
        Ok(())
    }

    async fn invalidate(&self, user_id: &str) -> Result<(), StoreError> {
        self.entries()?.remove(user_id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.touched.elapsed() < self.ttl);
        Ok(before - entries.len())
    }
}
