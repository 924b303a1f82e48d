//! HTTP request handlers

use super::types::{
    CallbackResponse, EventForm, EventListQuery, ParticipantForm, SignupForm, UserUpdateForm,
};
use super::AppState;
use crate::db::{DbError, Event, EventKey, Participant, User};
use crate::platform::{WebhookEvent, WebhookPayload};
use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Users
        .route("/signup", post(signup))
        .route("/userlist", get(list_users))
        .route("/user/:user_id", get(get_user).post(update_user))
        .route("/user/:user_id/delete", post(delete_user))
        // Events
        .route("/event/register", post(register_event))
        .route("/event/list", get(list_events))
        .route(
            "/event/:host_id/:event_name",
            get(get_event).post(update_event),
        )
        .route("/event/:host_id/:event_name/delete", post(delete_event))
        // Participants
        .route(
            "/event/:host_id/:event_name/participants",
            get(list_event_participants).post(add_participant),
        )
        .route(
            "/event/:host_id/:event_name/participants/:participant_id",
            get(get_participant),
        )
        .route(
            "/event/:host_id/:event_name/participants/:participant_id/delete",
            post(delete_participant),
        )
        .route("/participants", get(list_participants))
        // Messaging platform webhook
        .route("/callback", post(callback))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Users
// ============================================================

async fn signup(
    State(state): State<AppState>,
    form: Result<Form<SignupForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let Form(form) = form?;
    require("userID", &form.user_id)?;

    state.db.add_user(&User::new(form.user_id, form.user_name))?;
    Ok(StatusCode::OK)
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.db.list_users()?))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.db.get_user(&user_id)?))
}

async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    form: Result<Form<UserUpdateForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let Form(form) = form?;
    state.db.update_user(&User::new(user_id, form.user_name))?;
    Ok(StatusCode::OK)
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.db.delete_user(&user_id)?;
    Ok(StatusCode::OK)
}

// ============================================================
// Events
// ============================================================

async fn register_event(
    State(state): State<AppState>,
    form: Result<Form<EventForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let Form(mut form) = form?;
    require("hostID", &form.host_id)?;
    require("eventName", &form.event_name)?;

    let key = EventKey::new(
        std::mem::take(&mut form.host_id),
        std::mem::take(&mut form.event_name),
    );
    let event = form
        .into_event(key)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.db.add_event(&event)?;
    tracing::info!(host_id = %event.host_id, event_name = %event.event_name, "Event registered");
    Ok(StatusCode::OK)
}

async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<Vec<Event>>, AppError> {
    let events = match query.host_id.as_deref() {
        Some(host_id) => state.db.list_events_hosted_by(host_id)?,
        None => state.db.list_events()?,
    };
    Ok(Json(events))
}

async fn get_event(
    State(state): State<AppState>,
    Path((host_id, event_name)): Path<(String, String)>,
) -> Result<Json<Event>, AppError> {
    Ok(Json(state.db.get_event(&EventKey::new(host_id, event_name))?))
}

async fn update_event(
    State(state): State<AppState>,
    Path((host_id, event_name)): Path<(String, String)>,
    form: Result<Form<EventForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let Form(form) = form?;
    let event = form
        .into_event(EventKey::new(host_id, event_name))
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.db.update_event(&event)?;
    Ok(StatusCode::OK)
}

async fn delete_event(
    State(state): State<AppState>,
    Path((host_id, event_name)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.db.delete_event(&EventKey::new(host_id, event_name))?;
    Ok(StatusCode::OK)
}

// ============================================================
// Participants
// ============================================================

async fn list_participants(
    State(state): State<AppState>,
) -> Result<Json<Vec<Participant>>, AppError> {
    Ok(Json(state.db.list_participants()?))
}

async fn list_event_participants(
    State(state): State<AppState>,
    Path((host_id, event_name)): Path<(String, String)>,
) -> Result<Json<Vec<Participant>>, AppError> {
    let key = EventKey::new(host_id, event_name);
    Ok(Json(state.db.list_participants_of(&key)?))
}

async fn add_participant(
    State(state): State<AppState>,
    Path((host_id, event_name)): Path<(String, String)>,
    form: Result<Form<ParticipantForm>, FormRejection>,
) -> Result<StatusCode, AppError> {
    let Form(form) = form?;
    require("participantID", &form.participant_id)?;

    let participant = Participant::new(host_id, event_name, form.participant_id);
    state.db.add_participant(&participant)?;
    Ok(StatusCode::OK)
}

async fn get_participant(
    State(state): State<AppState>,
    Path((host_id, event_name, participant_id)): Path<(String, String, String)>,
) -> Result<Json<Participant>, AppError> {
    let participant = Participant::new(host_id, event_name, participant_id);
    Ok(Json(state.db.get_participant(&participant)?))
}

async fn delete_participant(
    State(state): State<AppState>,
    Path((host_id, event_name, participant_id)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let participant = Participant::new(host_id, event_name, participant_id);
    state.db.delete_participant(&participant)?;
    Ok(StatusCode::OK)
}

// ============================================================
// Webhook
// ============================================================

/// Handle every text message in a webhook delivery, in order.
///
/// Any engine failure answers 500 so the platform redelivers; turns that
/// already succeeded are skipped on redelivery by their delivery id.
async fn callback(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CallbackResponse>, AppError> {
    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;

    let mut handled = 0;
    let mut failed = 0;
    for message in payload
        .events
        .into_iter()
        .filter_map(WebhookEvent::into_inbound)
    {
        let user_id = message.sender_id.clone();
        match state.dispatcher.handle(message).await {
            Ok(()) => handled += 1,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to handle message");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(AppError::Internal(format!(
            "{failed} webhook event(s) failed"
        )));
    }
    Ok(Json(CallbackResponse { handled }))
}

async fn get_version() -> &'static str {
    concat!("eventline ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { .. } | DbError::MissingReference { .. } => {
                AppError::NotFound(e.to_string())
            }
            DbError::Conflict { .. } => AppError::Conflict(e.to_string()),
            DbError::MissingKey(_) => AppError::BadRequest(e.to_string()),
            other => {
                tracing::error!(error = %other, "Database failure");
                AppError::Internal(other.to_string())
            }
        }
    }
}

impl From<FormRejection> for AppError {
    fn from(e: FormRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, message).into_response()
    }
}
