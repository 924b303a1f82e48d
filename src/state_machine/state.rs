//! Registration form state types

use crate::db::Event;
use crate::prompt::Prompts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Per-turn context handed to the transition function
#[derive(Debug, Clone)]
pub struct FormContext {
    /// Platform id of the user whose message is being handled
    pub sender_id: String,
    pub prompts: Arc<Prompts>,
    /// Text that confirms the summary at `Done`
    pub confirm_token: String,
}

impl FormContext {
    pub fn new(
        sender_id: impl Into<String>,
        prompts: Arc<Prompts>,
        confirm_token: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            prompts,
            confirm_token: confirm_token.into(),
        }
    }
}

/// Position in the fixed field-collection sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Begin,
    EventName,
    Date,
    Deadline,
    Location,
    MembersMax,
    Lottery,
    Description,
    Done,
}

impl Step {
    pub const ALL: [Step; 9] = [
        Step::Begin,
        Step::EventName,
        Step::Date,
        Step::Deadline,
        Step::Location,
        Step::MembersMax,
        Step::Lottery,
        Step::Description,
        Step::Done,
    ];

    /// Zero-based position in the sequence
    pub fn index(self) -> usize {
        self as usize
    }

    /// The step that follows this one; `Done` has no successor
    pub fn next(self) -> Option<Step> {
        Step::ALL.get(self.index() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Begin => "begin",
            Step::EventName => "event_name",
            Step::Date => "date",
            Step::Deadline => "deadline",
            Step::Location => "location",
            Step::MembersMax => "members_max",
            Step::Lottery => "lottery",
            Step::Description => "description",
            Step::Done => "done",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draft fields that are parsed at confirmation and can be corrected in place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    MembersMax,
    Lottery,
}

impl DraftField {
    /// The step whose question collects this field
    pub fn step(self) -> Step {
        match self {
            DraftField::MembersMax => Step::MembersMax,
            DraftField::Lottery => Step::Lottery,
        }
    }
}

/// Every field of an event as typed by the user, before parsing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventDraft {
    pub event_name: String,
    pub date: String,
    pub deadline: String,
    pub location: String,
    pub members_max: String,
    pub lottery: String,
    pub description: String,
}

impl EventDraft {
    /// Replace the raw text of a correctable field
    pub fn set(&mut self, field: DraftField, value: String) {
        match field {
            DraftField::MembersMax => self.members_max = value,
            DraftField::Lottery => self.lottery = value,
        }
    }

    /// Build the committed event once the numeric fields have been parsed
    pub fn into_event(self, host_id: String, members_max: i64, lottery: bool) -> Event {
        Event {
            host_id,
            event_name: self.event_name,
            date: self.date,
            deadline: self.deadline,
            location: self.location,
            members_max,
            lottery,
            description: self.description,
        }
    }
}

/// Form progress; each variant carries exactly the fields collected so far
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FormState {
    /// Nothing collected; the next message starts the form
    #[default]
    Begin,

    /// Waiting for the event name
    EventName,

    Date {
        event_name: String,
    },

    Deadline {
        event_name: String,
        date: String,
    },

    Location {
        event_name: String,
        date: String,
        deadline: String,
    },

    MembersMax {
        event_name: String,
        date: String,
        deadline: String,
        location: String,
    },

    Lottery {
        event_name: String,
        date: String,
        deadline: String,
        location: String,
        members_max: String,
    },

    Description {
        event_name: String,
        date: String,
        deadline: String,
        location: String,
        members_max: String,
        lottery: String,
    },

    /// All fields collected; waiting for the confirm token
    Done {
        draft: EventDraft,
        /// Field the user is re-entering after it failed to parse
        #[serde(default)]
        fixing: Option<DraftField>,
    },
}

impl FormState {
    pub fn step(&self) -> Step {
        match self {
            FormState::Begin => Step::Begin,
            FormState::EventName => Step::EventName,
            FormState::Date { .. } => Step::Date,
            FormState::Deadline { .. } => Step::Deadline,
            FormState::Location { .. } => Step::Location,
            FormState::MembersMax { .. } => Step::MembersMax,
            FormState::Lottery { .. } => Step::Lottery,
            FormState::Description { .. } => Step::Description,
            FormState::Done { .. } => Step::Done,
        }
    }

    /// Store `text` as the value of the current step and move to the next one.
    /// `Begin` ignores the text. `Done` is not advanced here.
    pub fn fill(self, text: String) -> FormState {
        match self {
            FormState::Begin => FormState::EventName,
            FormState::EventName => FormState::Date { event_name: text },
            FormState::Date { event_name } => FormState::Deadline {
                event_name,
                date: text,
            },
            FormState::Deadline { event_name, date } => FormState::Location {
                event_name,
                date,
                deadline: text,
            },
            FormState::Location {
                event_name,
                date,
                deadline,
            } => FormState::MembersMax {
                event_name,
                date,
                deadline,
                location: text,
            },
            FormState::MembersMax {
                event_name,
                date,
                deadline,
                location,
            } => FormState::Lottery {
                event_name,
                date,
                deadline,
                location,
                members_max: text,
            },
            FormState::Lottery {
                event_name,
                date,
                deadline,
                location,
                members_max,
            } => FormState::Description {
                event_name,
                date,
                deadline,
                location,
                members_max,
                lottery: text,
            },
            FormState::Description {
                event_name,
                date,
                deadline,
                location,
                members_max,
                lottery,
            } => FormState::Done {
                draft: EventDraft {
                    event_name,
                    date,
                    deadline,
                    location,
                    members_max,
                    lottery,
                    description: text,
                },
                fixing: None,
            },
            done @ FormState::Done { .. } => done,
        }
    }
}
