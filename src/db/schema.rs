//! Database schema and entity types

use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT NOT NULL,
    user_name TEXT NOT NULL,
    PRIMARY KEY (user_id)
);

CREATE INDEX IF NOT EXISTS idx_users_name ON users(user_name);

CREATE TABLE IF NOT EXISTS events (
    host_id TEXT NOT NULL,
    event_name TEXT NOT NULL,
    date TEXT NOT NULL,
    deadline TEXT NOT NULL,
    location TEXT NOT NULL,
    members_max INTEGER NOT NULL DEFAULT 0,
    lottery BOOLEAN NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (host_id, event_name)
);

CREATE TABLE IF NOT EXISTS participants (
    host_id TEXT NOT NULL,
    event_name TEXT NOT NULL,
    participant_id TEXT NOT NULL,
    PRIMARY KEY (host_id, event_name, participant_id),
    FOREIGN KEY (host_id) REFERENCES users(user_id),
    FOREIGN KEY (participant_id) REFERENCES users(user_id),
    FOREIGN KEY (host_id, event_name)
        REFERENCES events(host_id, event_name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_participants_event ON participants(host_id, event_name);

CREATE TABLE IF NOT EXISTS sessions (
    user_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// A platform user who signed up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
}

impl User {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

/// Composite key of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub host_id: String,
    pub event_name: String,
}

impl EventKey {
    pub fn new(host_id: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            event_name: event_name.into(),
        }
    }
}

/// A registered event, owned by its host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "hostID")]
    pub host_id: String,
    pub event_name: String,
    pub date: String,
    pub deadline: String,
    pub location: String,
    pub members_max: i64,
    pub lottery: bool,
    pub description: String,
}

impl Event {
    pub fn key(&self) -> EventKey {
        EventKey::new(&self.host_id, &self.event_name)
    }
}

/// A user's entry in someone's event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(rename = "hostID")]
    pub host_id: String,
    pub event_name: String,
    #[serde(rename = "participantID")]
    pub participant_id: String,
}

impl Participant {
    pub fn new(
        host_id: impl Into<String>,
        event_name: impl Into<String>,
        participant_id: impl Into<String>,
    ) -> Self {
        Self {
            host_id: host_id.into(),
            event_name: event_name.into(),
            participant_id: participant_id.into(),
        }
    }
}
