//! Persistence gateway used by the conversation layer
//!
//! The engine and dispatcher only see the [`Gateway`] trait. Records live
//! either in this process ([`DatabaseGateway`]) or behind the HTTP routes of
//! another instance ([`HttpGateway`]).

mod http;

pub use http::HttpGateway;

use crate::db::{Database, DbError, Event, EventKey, Participant, User};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("gateway unreachable: {0}")]
    Transport(String),
    #[error("gateway backend failure: {0}")]
    Backend(String),
}

impl From<DbError> for GatewayError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { .. } | DbError::MissingReference { .. } => {
                GatewayError::NotFound(e.to_string())
            }
            DbError::Conflict { .. } => GatewayError::Conflict(e.to_string()),
            DbError::MissingKey(_) => GatewayError::Invalid(e.to_string()),
            other => GatewayError::Backend(other.to_string()),
        }
    }
}

/// Typed access to users, events and participants
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn add_user(&self, user: &User) -> Result<(), GatewayError>;

    async fn get_user(&self, user_id: &str) -> Result<User, GatewayError>;

    /// All users, ordered by name
    async fn list_users(&self) -> Result<Vec<User>, GatewayError>;

    async fn update_user(&self, user: &User) -> Result<(), GatewayError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), GatewayError>;

    async fn add_event(&self, event: &Event) -> Result<(), GatewayError>;

    async fn get_event(&self, key: &EventKey) -> Result<Event, GatewayError>;

    /// All events, ordered by host id
    async fn list_events(&self) -> Result<Vec<Event>, GatewayError>;

    /// Events of one host, ordered by event name
    async fn list_events_hosted_by(&self, host_id: &str) -> Result<Vec<Event>, GatewayError>;

    /// Rewrite every non-key field of an existing event
    async fn update_event(&self, event: &Event) -> Result<(), GatewayError>;

    /// Delete an event together with its participant entries
    async fn delete_event(&self, key: &EventKey) -> Result<(), GatewayError>;

    async fn add_participant(&self, participant: &Participant) -> Result<(), GatewayError>;

    async fn get_participant(&self, participant: &Participant)
        -> Result<Participant, GatewayError>;

    /// All participant entries, ordered by participant id
    async fn list_participants(&self) -> Result<Vec<Participant>, GatewayError>;

    /// Participants of one event, ordered by participant id
    async fn list_participants_of(&self, key: &EventKey)
        -> Result<Vec<Participant>, GatewayError>;

    async fn delete_participant(&self, participant: &Participant) -> Result<(), GatewayError>;
}

#[async_trait]
impl<T: Gateway + ?Sized> Gateway for Arc<T> {
    async fn add_user(&self, user: &User) -> Result<(), GatewayError> {
        (**self).add_user(user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User, GatewayError> {
        (**self).get_user(user_id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        (**self).list_users().await
    }

    async fn update_user(&self, user: &User) -> Result<(), GatewayError> {
        (**self).update_user(user).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), GatewayError> {
        (**self).delete_user(user_id).await
    }

    async fn add_event(&self, event: &Event) -> Result<(), GatewayError> {
        (**self).add_event(event).await
    }

    async fn get_event(&self, key: &EventKey) -> Result<Event, GatewayError> {
        (**self).get_event(key).await
    }

    async fn list_events(&self) -> Result<Vec<Event>, GatewayError> {
        (**self).list_events().await
    }

    async fn list_events_hosted_by(&self, host_id: &str) -> Result<Vec<Event>, GatewayError> {
        (**self).list_events_hosted_by(host_id).await
    }

    async fn update_event(&self, event: &Event) -> Result<(), GatewayError> {
        (**self).update_event(event).await
    }

    async fn delete_event(&self, key: &EventKey) -> Result<(), GatewayError> {
        (**self).delete_event(key).await
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        (**self).add_participant(participant).await
    }

    async fn get_participant(
        &self,
        participant: &Participant,
    ) -> Result<Participant, GatewayError> {
        (**self).get_participant(participant).await
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, GatewayError> {
        (**self).list_participants().await
    }

    async fn list_participants_of(
        &self,
        key: &EventKey,
    ) -> Result<Vec<Participant>, GatewayError> {
        (**self).list_participants_of(key).await
    }

    async fn delete_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        (**self).delete_participant(participant).await
    }
}

// ============================================================================
// In-process adapter
// ============================================================================

/// Adapter to use the local database as the gateway
#[derive(Clone)]
pub struct DatabaseGateway {
    db: Database,
}

impl DatabaseGateway {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Gateway for DatabaseGateway {
    async fn add_user(&self, user: &User) -> Result<(), GatewayError> {
        Ok(self.db.add_user(user)?)
    }

    async fn get_user(&self, user_id: &str) -> Result<User, GatewayError> {
        Ok(self.db.get_user(user_id)?)
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        Ok(self.db.list_users()?)
    }

    async fn update_user(&self, user: &User) -> Result<(), GatewayError> {
        Ok(self.db.update_user(user)?)
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), GatewayError> {
        Ok(self.db.delete_user(user_id)?)
    }

    async fn add_event(&self, event: &Event) -> Result<(), GatewayError> {
        Ok(self.db.add_event(event)?)
    }

    async fn get_event(&self, key: &EventKey) -> Result<Event, GatewayError> {
        Ok(self.db.get_event(key)?)
    }

    async fn list_events(&self) -> Result<Vec<Event>, GatewayError> {
        Ok(self.db.list_events()?)
    }

    async fn list_events_hosted_by(&self, host_id: &str) -> Result<Vec<Event>, GatewayError> {
        Ok(self.db.list_events_hosted_by(host_id)?)
    }

    async fn update_event(&self, event: &Event) -> Result<(), GatewayError> {
        Ok(self.db.update_event(event)?)
    }

    async fn delete_event(&self, key: &EventKey) -> Result<(), GatewayError> {
        Ok(self.db.delete_event(key)?)
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        Ok(self.db.add_participant(participant)?)
    }

    async fn get_participant(
        &self,
        participant: &Participant,
    ) -> Result<Participant, GatewayError> {
        Ok(self.db.get_participant(participant)?)
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, GatewayError> {
        Ok(self.db.list_participants()?)
    }

    async fn list_participants_of(
        &self,
        key: &EventKey,
    ) -> Result<Vec<Participant>, GatewayError> {
        Ok(self.db.list_participants_of(key)?)
    }

    async fn delete_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        Ok(self.db.delete_participant(participant)?)
    }
}
