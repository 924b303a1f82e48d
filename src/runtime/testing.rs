//! Mock implementations for testing
//!
//! These mocks enable end-to-end testing of the runtime without real I/O.

use super::*;
use crate::db::{Database, Event, EventKey, Participant, User};
use crate::gateway::{DatabaseGateway, GatewayError};
use crate::render::FlexTicketRenderer;
use crate::session::{DatabaseSessionStore, InMemorySessionStore, Session};
use crate::state_machine::{FormState, Step};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// Mock Gateway
// ============================================================================

/// In-memory gateway with injectable failures
#[derive(Default)]
pub struct MockGateway {
    users: Mutex<Vec<User>>,
    events: Mutex<Vec<Event>>,
    participants: Mutex<Vec<Participant>>,
    failures: Mutex<VecDeque<GatewayError>>,
    /// Number of `add_event` calls, successful or not
    pub add_event_calls: AtomicUsize,
    /// Fail user and listing calls as if the backend were down
    pub unavailable: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `add_event` call fail with `error`
    pub fn fail_next_add_event(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn committed_events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Backend("database is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn add_user(&self, user: &User) -> Result<(), GatewayError> {
        self.check_available()?;
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.user_id == user.user_id) {
            return Err(GatewayError::Conflict(format!("user {}", user.user_id)));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<User, GatewayError> {
        self.check_available()?;
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<(), GatewayError> {
        let mut users = self.users.lock().unwrap();
        let existing = users
            .iter_mut()
            .find(|u| u.user_id == user.user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("user {}", user.user_id)))?;
        existing.clone_from(user);
        Ok(())
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), GatewayError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.user_id != user_id);
        if users.len() == before {
            return Err(GatewayError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }

    async fn add_event(&self, event: &Event) -> Result<(), GatewayError> {
        self.add_event_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let mut events = self.events.lock().unwrap();
        if events.iter().any(|e| e.key() == event.key()) {
            return Err(GatewayError::Conflict(format!("event {}", event.event_name)));
        }
        events.push(event.clone());
        Ok(())
    }

    async fn get_event(&self, key: &EventKey) -> Result<Event, GatewayError> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.key() == *key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("event {}", key.event_name)))
    }

    async fn list_events(&self) -> Result<Vec<Event>, GatewayError> {
        let mut events = self.events.lock().unwrap().clone();
        events.sort_by(|a, b| a.host_id.cmp(&b.host_id));
        Ok(events)
    }

    async fn list_events_hosted_by(&self, host_id: &str) -> Result<Vec<Event>, GatewayError> {
        self.check_available()?;
        let mut events: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.host_id == host_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.event_name.cmp(&b.event_name));
        Ok(events)
    }

    async fn update_event(&self, event: &Event) -> Result<(), GatewayError> {
        let mut events = self.events.lock().unwrap();
        let existing = events
            .iter_mut()
            .find(|e| e.key() == event.key())
            .ok_or_else(|| GatewayError::NotFound(format!("event {}", event.event_name)))?;
        existing.clone_from(event);
        Ok(())
    }

    async fn delete_event(&self, key: &EventKey) -> Result<(), GatewayError> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| e.key() != *key);
        if events.len() == before {
            return Err(GatewayError::NotFound(format!("event {}", key.event_name)));
        }
        self.participants
            .lock()
            .unwrap()
            .retain(|p| p.host_id != key.host_id || p.event_name != key.event_name);
        Ok(())
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        self.participants.lock().unwrap().push(participant.clone());
        Ok(())
    }

    async fn get_participant(
        &self,
        participant: &Participant,
    ) -> Result<Participant, GatewayError> {
        self.participants
            .lock()
            .unwrap()
            .iter()
            .find(|p| *p == participant)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("participant {}", participant.participant_id)))
    }

    async fn list_participants(&self) -> Result<Vec<Participant>, GatewayError> {
        let mut participants = self.participants.lock().unwrap().clone();
        participants.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        Ok(participants)
    }

    async fn list_participants_of(
        &self,
        key: &EventKey,
    ) -> Result<Vec<Participant>, GatewayError> {
        Ok(self
            .participants
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.host_id == key.host_id && p.event_name == key.event_name)
            .cloned()
            .collect())
    }

    async fn delete_participant(&self, participant: &Participant) -> Result<(), GatewayError> {
        let mut participants = self.participants.lock().unwrap();
        let before = participants.len();
        participants.retain(|p| p != participant);
        if participants.len() == before {
            return Err(GatewayError::NotFound(format!(
                "participant {}",
                participant.participant_id
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Failing Session Store
// ============================================================================

/// In-memory store whose writes can be switched to fail
pub struct FailingSessionStore {
    inner: InMemorySessionStore,
    pub fail_saves: AtomicBool,
}

impl FailingSessionStore {
    pub fn new() -> Self {
        Self {
            inner: InMemorySessionStore::new(Duration::from_secs(60)),
            fail_saves: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get(&self, user_id: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get(user_id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.save(session).await
    }

    async fn invalidate(&self, user_id: &str) -> Result<(), StoreError> {
        self.inner.invalidate(user_id).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.inner.purge_expired().await
    }
}

// ============================================================================
// Test Helpers
// ============================================================================

pub fn test_manager(
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn Gateway>,
    idle_timeout: Duration,
) -> RuntimeManager {
    RuntimeManager::new(
        store,
        gateway,
        Arc::new(FlexTicketRenderer::new(None)),
        Arc::new(Prompts::default()),
        "ok".to_string(),
        idle_timeout,
    )
}

pub fn texts(outbound: &[Outbound]) -> Vec<String> {
    outbound
        .iter()
        .filter_map(|o| match o {
            Outbound::Text(text) => Some(text.clone()),
            Outbound::Ticket(_) => None,
        })
        .collect()
}

fn has_ticket(outbound: &[Outbound]) -> bool {
    outbound.iter().any(|o| matches!(o, Outbound::Ticket(_)))
}

const PICNIC_FIELDS: [&str; 7] = [
    "Picnic",
    "2024-05-01 10:00",
    "2024-04-25",
    "Central Park",
    "20",
    "false",
    "Bring snacks",
];

/// Register and fill every field, leaving the session at `Done`
async fn fill_form(manager: &RuntimeManager, user: &str, fields: &[&str]) {
    let replies = manager
        .submit(user, Input::Register, None, WhenAbsent::Begin)
        .await
        .unwrap();
    assert!(texts(&replies)[0].contains("event name"));

    for field in fields {
        manager
            .submit(user, Input::message(*field), None, WhenAbsent::Ignore)
            .await
            .unwrap();
    }
}

async fn step_of(store: &dyn SessionStore, user: &str) -> Option<Step> {
    store.get(user).await.unwrap().map(|s| s.step())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_registration_commits_and_ends_session() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let gateway = Arc::new(MockGateway::new());
    let manager = test_manager(store.clone(), gateway.clone(), Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS).await;
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Done));

    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(has_ticket(&replies));
    assert_eq!(texts(&replies), vec![Prompts::default().registered]);

    assert_eq!(
        gateway.committed_events(),
        vec![Event {
            host_id: "U1".to_string(),
            event_name: "Picnic".to_string(),
            date: "2024-05-01 10:00".to_string(),
            deadline: "2024-04-25".to_string(),
            location: "Central Park".to_string(),
            members_max: 20,
            lottery: false,
            description: "Bring snacks".to_string(),
        }]
    );
    assert_eq!(step_of(store.as_ref(), "U1").await, None);

    // A trailing "ok" finds no session and is dropped, never a second commit
    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(replies.is_empty());
    assert_eq!(step_of(store.as_ref(), "U1").await, None);
    assert_eq!(gateway.add_event_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_free_text_without_session_is_ignored() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(replies.is_empty());
    assert_eq!(step_of(store.as_ref(), "U1").await, None);
}

#[tokio::test]
async fn test_gateway_failure_keeps_session_for_retry() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let gateway = Arc::new(MockGateway::new());
    let manager = test_manager(store.clone(), gateway.clone(), Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS).await;
    gateway.fail_next_add_event(GatewayError::Transport("connection refused".to_string()));

    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert_eq!(texts(&replies), vec![Prompts::default().commit_failed]);
    assert!(!has_ticket(&replies));

    let session = store.get("U1").await.unwrap().unwrap();
    assert_eq!(session.step(), Step::Done);
    assert!(session.confirmed);

    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(has_ticket(&replies));
    assert_eq!(gateway.committed_events().len(), 1);
    assert_eq!(gateway.add_event_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_conflict_is_reported_to_user() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let gateway = Arc::new(MockGateway::new());
    let manager = test_manager(store.clone(), gateway.clone(), Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS).await;
    manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();

    fill_form(&manager, "U1", &PICNIC_FIELDS).await;
    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert_eq!(texts(&replies), vec![Prompts::default().conflict]);
    assert_eq!(gateway.committed_events().len(), 1);
}

#[tokio::test]
async fn test_store_failure_aborts_turn() {
    let store = Arc::new(FailingSessionStore::new());
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    manager
        .submit("U1", Input::Register, None, WhenAbsent::Begin)
        .await
        .unwrap();

    store.fail_saves.store(true, Ordering::SeqCst);
    let result = manager
        .submit("U1", Input::message("Picnic"), None, WhenAbsent::Ignore)
        .await;
    assert!(matches!(result, Err(EngineError::Store(_))));
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::EventName));

    // The same message succeeds once the store recovers
    store.fail_saves.store(false, Ordering::SeqCst);
    let replies = manager
        .submit("U1", Input::message("Picnic"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(texts(&replies)[0].contains("date"));
}

#[tokio::test]
async fn test_invalid_members_max_never_commits() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let gateway = Arc::new(MockGateway::new());
    let manager = test_manager(store.clone(), gateway.clone(), Duration::from_secs(60));

    let mut fields = PICNIC_FIELDS;
    fields[4] = "lots";
    fill_form(&manager, "U1", &fields).await;

    let replies = manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(texts(&replies)[0].contains("whole number"));
    assert_eq!(gateway.add_event_calls.load(Ordering::SeqCst), 0);

    // Correct the field, then confirm
    manager
        .submit("U1", Input::message("15"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();

    let events = gateway.committed_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].members_max, 15);
    assert_eq!(events[0].event_name, "Picnic");
}

#[tokio::test]
async fn test_register_mid_form_starts_over() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS[..3]).await;
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Location));

    manager
        .submit("U1", Input::Register, None, WhenAbsent::Begin)
        .await
        .unwrap();
    let session = store.get("U1").await.unwrap().unwrap();
    assert_eq!(session.form, FormState::EventName);
}

#[tokio::test]
async fn test_redelivered_message_advances_once() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    manager
        .submit("U1", Input::Register, Some("d-1".to_string()), WhenAbsent::Begin)
        .await
        .unwrap();

    let first = manager
        .submit("U1", Input::message("Picnic"), Some("d-2".to_string()), WhenAbsent::Ignore)
        .await
        .unwrap();
    let second = manager
        .submit("U1", Input::message("Picnic"), Some("d-2".to_string()), WhenAbsent::Ignore)
        .await
        .unwrap();

    assert!(!first.is_empty());
    assert!(second.is_empty());
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Date));
}

/// Submit `(delivery id, input)` pairs in order and return every reply batch
async fn deliver(
    manager: &RuntimeManager,
    user: &str,
    batch: &[(&str, Input)],
) -> Vec<Vec<Outbound>> {
    let mut replies = Vec::new();
    for (id, input) in batch {
        let when_absent = if matches!(input, Input::Message { .. }) {
            WhenAbsent::Ignore
        } else {
            WhenAbsent::Begin
        };
        replies.push(
            manager
                .submit(user, input.clone(), Some((*id).to_string()), when_absent)
                .await
                .unwrap(),
        );
    }
    replies
}

#[tokio::test]
async fn test_replayed_batch_leaves_form_untouched() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    let batch = [
        ("e0", Input::Register),
        ("e1", Input::message("Picnic")),
        ("e2", Input::message("May 1")),
    ];
    deliver(&manager, "U1", &batch).await;

    // The whole batch comes again, e.g. after another event in it failed
    let replayed = deliver(&manager, "U1", &batch).await;
    assert!(replayed.iter().all(Vec::is_empty));

    let session = store.get("U1").await.unwrap().unwrap();
    assert_eq!(
        session.form,
        FormState::Deadline {
            event_name: "Picnic".to_string(),
            date: "May 1".to_string(),
        }
    );
}

#[tokio::test]
async fn test_replay_after_runtime_restart_is_skipped() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_millis(20));

    let batch = [
        ("e0", Input::Register),
        ("e1", Input::message("Picnic")),
        ("e2", Input::message("May 1")),
    ];
    deliver(&manager, "U1", &batch).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.active_runtimes().await, 0);

    // A fresh runtime only knows the ids stored with the session
    let replayed = deliver(&manager, "U1", &batch[1..]).await;
    assert!(replayed.iter().all(Vec::is_empty));
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Deadline));
}

#[tokio::test]
async fn test_replay_after_registration_does_not_restart() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let gateway = Arc::new(MockGateway::new());
    let manager = test_manager(store.clone(), gateway.clone(), Duration::from_secs(60));

    let ids = ["e0", "e1", "e2", "e3", "e4", "e5", "e6", "e7", "e8"];
    let mut batch = vec![(ids[0], Input::Register)];
    for (id, field) in ids[1..8].iter().zip(PICNIC_FIELDS) {
        batch.push((*id, Input::message(field)));
    }
    batch.push((ids[8], Input::message("ok")));

    let replies = deliver(&manager, "U1", &batch).await;
    assert!(has_ticket(&replies[8]));
    assert_eq!(step_of(store.as_ref(), "U1").await, None);

    let replayed = deliver(&manager, "U1", &batch).await;
    assert!(replayed.iter().all(Vec::is_empty));
    assert_eq!(step_of(store.as_ref(), "U1").await, None);
    assert_eq!(gateway.add_event_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_turn_can_be_redelivered() {
    let store = Arc::new(FailingSessionStore::new());
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    deliver(&manager, "U1", &[("e0", Input::Register)]).await;

    store.fail_saves.store(true, Ordering::SeqCst);
    let result = manager
        .submit("U1", Input::message("Picnic"), Some("e1".to_string()), WhenAbsent::Ignore)
        .await;
    assert!(result.is_err());

    store.fail_saves.store(false, Ordering::SeqCst);
    let replies = deliver(&manager, "U1", &[("e1", Input::message("Picnic"))]).await;
    assert!(texts(&replies[0])[0].contains("date"));
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Date));
}

#[tokio::test]
async fn test_concurrent_turns_are_serialized() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = Arc::new(test_manager(
        store.clone(),
        Arc::new(MockGateway::new()),
        Duration::from_secs(60),
    ));

    manager
        .submit("U1", Input::Register, None, WhenAbsent::Begin)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..7 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move {
            manager
                .submit(
                    "U1",
                    Input::message(format!("value {i}")),
                    Some(format!("d-{i}")),
                    WhenAbsent::Ignore,
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Seven answers take the form from EventName to Done with none lost
    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Done));
}

#[tokio::test]
async fn test_users_are_independent() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS[..2]).await;
    fill_form(&manager, "U2", &PICNIC_FIELDS[..5]).await;

    assert_eq!(step_of(store.as_ref(), "U1").await, Some(Step::Deadline));
    assert_eq!(step_of(store.as_ref(), "U2").await, Some(Step::Lottery));
}

#[tokio::test]
async fn test_idle_runtime_is_recreated() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_millis(20));

    manager
        .submit("U1", Input::Register, None, WhenAbsent::Begin)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(manager.active_runtimes().await, 0);

    let replies = manager
        .submit("U1", Input::message("Picnic"), None, WhenAbsent::Ignore)
        .await
        .unwrap();
    assert!(texts(&replies)[0].contains("date"));
    assert_eq!(manager.active_runtimes().await, 1);
}

#[tokio::test]
async fn test_cancel_drops_session() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::from_secs(60)));
    let manager = test_manager(store.clone(), Arc::new(MockGateway::new()), Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS[..4]).await;
    let replies = manager
        .submit("U1", Input::Cancel, None, WhenAbsent::Begin)
        .await
        .unwrap();
    assert_eq!(texts(&replies), vec![Prompts::default().cancelled]);
    assert_eq!(step_of(store.as_ref(), "U1").await, None);
}

#[tokio::test]
async fn test_database_backed_registration() {
    let db = Database::open_in_memory().unwrap();
    let store: Arc<dyn SessionStore> =
        Arc::new(DatabaseSessionStore::new(db.clone(), Duration::from_secs(60)));
    let gateway: Arc<dyn Gateway> = Arc::new(DatabaseGateway::new(db.clone()));
    let manager = test_manager(store.clone(), gateway, Duration::from_secs(60));

    fill_form(&manager, "U1", &PICNIC_FIELDS).await;
    manager
        .submit("U1", Input::message("ok"), None, WhenAbsent::Ignore)
        .await
        .unwrap();

    let event = db.get_event(&EventKey::new("U1", "Picnic")).unwrap();
    assert_eq!(event.location, "Central Park");
    assert!(db.get_session("U1").unwrap().is_none());
}

#[tokio::test]
async fn test_sweeper_purges_expired_sessions() {
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Duration::ZERO));
    store.create("U1").await.unwrap();

    let cancel = CancellationToken::new();
    let sweeper = spawn_session_sweeper(store.clone(), Duration::from_millis(10), cancel.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    sweeper.await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 0);
}
