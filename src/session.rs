//! Per-user registration sessions
//!
//! A session is the in-progress form state of one user. Stores give
//! read-your-writes per key and treat sessions idle past their TTL as absent.

mod database;
mod memory;

pub use database::DatabaseSessionStore;
pub use memory::InMemorySessionStore;

use crate::state_machine::{FormState, Step};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Default inactivity timeout for sessions
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

/// How many delivery ids a session remembers for redelivery checks
pub const RECENT_DELIVERY_LIMIT: usize = 64;

/// In-progress registration state for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    /// The user who started the registration; owner of the resulting event
    pub host_id: String,
    pub form: FormState,
    /// Set once the user accepted the summary and the draft parsed cleanly
    #[serde(default)]
    pub confirmed: bool,
    /// Platform delivery ids of the most recent messages applied, oldest first
    #[serde(default)]
    pub recent_deliveries: VecDeque<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            host_id: user_id.clone(),
            user_id,
            form: FormState::Begin,
            confirmed: false,
            recent_deliveries: VecDeque::new(),
        }
    }

    pub fn step(&self) -> Step {
        self.form.step()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session backend error: {0}")]
    Backend(String),
    #[error("session lock poisoned")]
    LockPoisoned,
}

impl From<crate::db::DbError> for StoreError {
    fn from(e: crate::db::DbError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Keyed session storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the live session for a user
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError>;

    /// Persist a session, replacing any previous one for the same user
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Expire a user's session immediately; absent sessions are fine
    async fn invalidate(&self, user_id: &str) -> Result<(), StoreError>;

    /// Drop every session past its inactivity timeout
    async fn purge_expired(&self) -> Result<usize, StoreError>;

    /// Start a new session at `Begin` and persist it
    async fn create(&self, user_id: &str) -> Result<Session, StoreError> {
        let session = Session::new(user_id);
        self.save(&session).await?;
        Ok(session)
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError> {
        (**self).get(user_id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        (**self).save(session).await
    }

    async fn invalidate(&self, user_id: &str) -> Result<(), StoreError> {
        (**self).invalidate(user_id).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        (**self).purge_expired().await
    }

    async fn create(&self, user_id: &str) -> Result<Session, StoreError> {
        (**self).create(user_id).await
    }
}
