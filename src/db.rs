//! Database module for eventline
//!
//! Relational persistence for users, events, participants and in-progress
//! registration sessions. Every mutating statement goes through
//! [`exec_affecting_one_row`], so a write that touches zero rows surfaces as
//! not-found and a write that touches several is reported instead of being
//! silently accepted.

mod schema;

pub use schema::*;

use crate::session::Session;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, Params, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },
    #[error("{entity} references a missing row: {key}")]
    MissingReference { entity: &'static str, key: String },
    #[error("expected 1 row affected, got {0}")]
    RowCount(usize),
    #[error("{0} with unassigned key")]
    MissingKey(&'static str),
    #[error("Invalid stored session: {0}")]
    Session(#[from] serde_json::Error),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

#[cfg(test)]
impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Session row as persisted, with its last-write time
#[derive(Debug, Clone)]
pub struct StoredSession {
    pub session: Session,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    // ==================== User Operations ====================

    /// List all users ordered by name
    pub fn list_users(&self) -> DbResult<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT user_id, user_name FROM users ORDER BY user_name, user_id",
        )?;
        let rows = stmt.query_map([], user_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Get a user by platform id
    pub fn get_user(&self, user_id: &str) -> DbResult<User> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT user_id, user_name FROM users WHERE user_id = ?1")?;
        stmt.query_row(params![user_id], user_from_row)
            .map_err(|e| not_found_or(e, "user", user_id))
    }

    /// Insert a new user
    pub fn add_user(&self, user: &User) -> DbResult<()> {
        if user.user_id.is_empty() {
            return Err(DbError::MissingKey("user"));
        }
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "INSERT INTO users (user_id, user_name) VALUES (?1, ?2)",
            params![user.user_id, user.user_name],
            "user",
            &user.user_id,
        )
    }

    /// Update the name of an existing user
    pub fn update_user(&self, user: &User) -> DbResult<()> {
        if user.user_id.is_empty() {
            return Err(DbError::MissingKey("user"));
        }
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "UPDATE users SET user_name = ?2 WHERE user_id = ?1",
            params![user.user_id, user.user_name],
            "user",
            &user.user_id,
        )
    }

    /// Delete a user by id
    pub fn delete_user(&self, user_id: &str) -> DbResult<()> {
        if user_id.is_empty() {
            return Err(DbError::MissingKey("user"));
        }
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "DELETE FROM users WHERE user_id = ?1",
            params![user_id],
            "user",
            user_id,
        )
    }

    // ==================== Event Operations ====================

    /// List all events ordered by host
    pub fn list_events(&self) -> DbResult<Vec<Event>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT host_id, event_name, date, deadline, location, members_max, lottery, description
             FROM events ORDER BY host_id, event_name",
        )?;
        let rows = stmt.query_map([], event_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// List events hosted by one user, ordered by event name.
    /// An empty host id lists every event.
    pub fn list_events_hosted_by(&self, host_id: &str) -> DbResult<Vec<Event>> {
        if host_id.is_empty() {
            return self.list_events();
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT host_id, event_name, date, deadline, location, members_max, lottery, description
             FROM events WHERE host_id = ?1 ORDER BY event_name",
        )?;
        let rows = stmt.query_map(params![host_id], event_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Get an event by its composite key
    pub fn get_event(&self, key: &EventKey) -> DbResult<Event> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT host_id, event_name, date, deadline, location, members_max, lottery, description
             FROM events WHERE host_id = ?1 AND event_name = ?2",
        )?;
        stmt.query_row(params![key.host_id, key.event_name], event_from_row)
            .map_err(|e| not_found_or(e, "event", &event_key_display(key)))
    }

    /// Insert a new event
    pub fn add_event(&self, event: &Event) -> DbResult<()> {
        if event.host_id.is_empty() || event.event_name.is_empty() {
            return Err(DbError::MissingKey("event"));
        }
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "INSERT INTO events (host_id, event_name, date, deadline, location, members_max, lottery, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.host_id,
                event.event_name,
                event.date,
                event.deadline,
                event.location,
                event.members_max,
                event.lottery,
                event.description,
            ],
            "event",
            &event_key_display(&event.key()),
        )
    }

    /// Update the details of an existing event (the key is immutable)
    pub fn update_event(&self, event: &Event) -> DbResult<()> {
        if event.host_id.is_empty() || event.event_name.is_empty() {
            return Err(DbError::MissingKey("event"));
        }
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "UPDATE events
             SET date = ?3, deadline = ?4, location = ?5, members_max = ?6, lottery = ?7, description = ?8
             WHERE host_id = ?1 AND event_name = ?2",
            params![
                event.host_id,
                event.event_name,
                event.date,
                event.deadline,
                event.location,
                event.members_max,
                event.lottery,
                event.description,
            ],
            "event",
            &event_key_display(&event.key()),
        )
    }

    /// Delete an event; its participants are removed by CASCADE
    pub fn delete_event(&self, key: &EventKey) -> DbResult<()> {
        if key.host_id.is_empty() || key.event_name.is_empty() {
            return Err(DbError::MissingKey("event"));
        }
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "DELETE FROM events WHERE host_id = ?1 AND event_name = ?2",
            params![key.host_id, key.event_name],
            "event",
            &event_key_display(key),
        )
    }

    // ==================== Participant Operations ====================

    /// List all participants ordered by participant id
    pub fn list_participants(&self) -> DbResult<Vec<Participant>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT host_id, event_name, participant_id FROM participants
             ORDER BY participant_id, host_id, event_name",
        )?;
        let rows = stmt.query_map([], participant_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// List the participants of one event.
    /// An incomplete key lists every participant.
    pub fn list_participants_of(&self, key: &EventKey) -> DbResult<Vec<Participant>> {
        if key.host_id.is_empty() || key.event_name.is_empty() {
            return self.list_participants();
        }
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT host_id, event_name, participant_id FROM participants
             WHERE host_id = ?1 AND event_name = ?2
             ORDER BY event_name, participant_id",
        )?;
        let rows = stmt.query_map(params![key.host_id, key.event_name], participant_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Get a participant entry by its full key
    pub fn get_participant(&self, participant: &Participant) -> DbResult<Participant> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT host_id, event_name, participant_id FROM participants
             WHERE host_id = ?1 AND event_name = ?2 AND participant_id = ?3",
        )?;
        stmt.query_row(
            params![
                participant.host_id,
                participant.event_name,
                participant.participant_id
            ],
            participant_from_row,
        )
        .map_err(|e| not_found_or(e, "participant", &participant_key_display(participant)))
    }

    /// Insert a participant; the event and both users must exist
    pub fn add_participant(&self, participant: &Participant) -> DbResult<()> {
        check_participant_key(participant)?;
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "INSERT INTO participants (host_id, event_name, participant_id) VALUES (?1, ?2, ?3)",
            params![
                participant.host_id,
                participant.event_name,
                participant.participant_id
            ],
            "participant",
            &participant_key_display(participant),
        )
    }

    /// Delete a participant entry
    pub fn delete_participant(&self, participant: &Participant) -> DbResult<()> {
        check_participant_key(participant)?;
        let conn = self.conn()?;
        exec_affecting_one_row(
            &conn,
            "DELETE FROM participants WHERE host_id = ?1 AND event_name = ?2 AND participant_id = ?3",
            params![
                participant.host_id,
                participant.event_name,
                participant.participant_id
            ],
            "participant",
            &participant_key_display(participant),
        )
    }

    // ==================== Session Operations ====================

    /// Load a stored session, if any
    pub fn get_session(&self, user_id: &str) -> DbResult<Option<StoredSession>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT state, updated_at FROM sessions WHERE user_id = ?1")?;
        let row = stmt.query_row(params![user_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        });

        match row {
            Ok((state, updated_at)) => Ok(Some(StoredSession {
                session: serde_json::from_str(&state)?,
                updated_at: parse_datetime(&updated_at),
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::Sqlite(e)),
        }
    }

    /// Insert or replace the session for its user
    pub fn put_session(&self, session: &Session, now: DateTime<Utc>) -> DbResult<()> {
        let state = serde_json::to_string(session)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (user_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![session.user_id, state, timestamp(now)],
        )?;
        Ok(())
    }

    /// Remove a session; removing a missing session is not an error
    pub fn delete_session(&self, user_id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(())
    }

    /// Remove sessions last written at or before `cutoff`
    pub fn delete_sessions_before(&self, cutoff: DateTime<Utc>) -> DbResult<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM sessions WHERE updated_at <= ?1",
            params![timestamp(cutoff)],
        )?;
        Ok(removed)
    }
}

/// Execute a statement that must touch exactly one row.
fn exec_affecting_one_row<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    entity: &'static str,
    key: &str,
) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(sql)?;
    let affected = stmt
        .execute(params)
        .map_err(|e| classify_constraint(e, entity, key))?;

    match affected {
        1 => Ok(()),
        0 => Err(DbError::NotFound {
            entity,
            key: key.to_string(),
        }),
        n => Err(DbError::RowCount(n)),
    }
}

fn classify_constraint(err: rusqlite::Error, entity: &'static str, key: &str) -> DbError {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
        if ffi_err.code == ffi::ErrorCode::ConstraintViolation {
            match ffi_err.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    return DbError::Conflict {
                        entity,
                        key: key.to_string(),
                    };
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return DbError::MissingReference {
                        entity,
                        key: key.to_string(),
                    };
                }
                _ => {}
            }
        }
    }
    DbError::Sqlite(err)
}

fn not_found_or(err: rusqlite::Error, entity: &'static str, key: &str) -> DbError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound {
            entity,
            key: key.to_string(),
        },
        other => DbError::Sqlite(other),
    }
}

fn check_participant_key(participant: &Participant) -> DbResult<()> {
    if participant.host_id.is_empty()
        || participant.event_name.is_empty()
        || participant.participant_id.is_empty()
    {
        return Err(DbError::MissingKey("participant"));
    }
    Ok(())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        user_name: row.get(1)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        host_id: row.get(0)?,
        event_name: row.get(1)?,
        date: row.get(2)?,
        deadline: row.get(3)?,
        location: row.get(4)?,
        members_max: row.get(5)?,
        lottery: row.get(6)?,
        description: row.get(7)?,
    })
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        host_id: row.get(0)?,
        event_name: row.get(1)?,
        participant_id: row.get(2)?,
    })
}

fn event_key_display(key: &EventKey) -> String {
    format!("{}/{}", key.host_id, key.event_name)
}

fn participant_key_display(p: &Participant) -> String {
    format!("{}/{}/{}", p.host_id, p.event_name, p.participant_id)
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or(DateTime::<Utc>::MIN_UTC, |dt| dt.with_timezone(&Utc))
}
