//! API request and response types
//!
//! Gateway routes take `application/x-www-form-urlencoded` bodies with the
//! same field names as the JSON entities.

use crate::db::{Event, EventKey};
use crate::state_machine::{validate, EventDraft, ValidationError};
use serde::{Deserialize, Serialize};

/// Body of `POST /signup`
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(rename = "userID", default)]
    pub user_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: String,
}

/// Body of `POST /user/:user_id`
#[derive(Debug, Deserialize)]
pub struct UserUpdateForm {
    #[serde(rename = "userName", default)]
    pub user_name: String,
}

/// Event fields as submitted; numeric fields are parsed by the handler
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventForm {
    #[serde(rename = "hostID")]
    pub host_id: String,
    pub event_name: String,
    pub date: String,
    pub deadline: String,
    pub location: String,
    pub members_max: String,
    pub lottery: String,
    pub description: String,
}

impl EventForm {
    /// Parse into an event stored under `key`
    pub fn into_event(self, key: EventKey) -> Result<Event, ValidationError> {
        let draft = EventDraft {
            event_name: key.event_name,
            date: self.date,
            deadline: self.deadline,
            location: self.location,
            members_max: self.members_max,
            lottery: self.lottery,
            description: self.description,
        };
        let (members_max, lottery) = validate(&draft)?;
        Ok(draft.into_event(key.host_id, members_max, lottery))
    }
}

/// Body of `POST /event/:host_id/:event_name/participants`
#[derive(Debug, Deserialize)]
pub struct ParticipantForm {
    #[serde(rename = "participantID", default)]
    pub participant_id: String,
}

/// Query of `GET /event/list`
#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    #[serde(rename = "hostID")]
    pub host_id: Option<String>,
}

/// Response of `POST /callback`
#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub handled: usize,
}
