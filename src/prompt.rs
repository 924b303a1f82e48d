//! Reply templates for the registration form
//!
//! Every prompt is a pure function of the step the user is about to fill in.

use crate::state_machine::{DraftField, EventDraft, Step};

/// Reply texts used by the conversation engine
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Sent before the first question when registration starts
    pub intro: String,
    /// Question template; `{field}` is replaced with the field label
    pub input_format: String,
    pub summary_header: String,
    /// Tells the user how to confirm; `{token}` is replaced with the confirm token
    pub confirm_hint: String,
    pub restart: String,
    pub registered: String,
    pub cancelled: String,
    pub commit_failed: String,
    pub conflict: String,
    pub host_unknown: String,
    pub invalid_members_max: String,
    pub invalid_lottery: String,
    /// Reply when a lookup or signup could not reach the backend
    pub unavailable: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            intro: "Let's register a new event.".to_string(),
            input_format: "Please enter the {field}.".to_string(),
            summary_header: "Please check the event details.".to_string(),
            confirm_hint: "Reply \"{token}\" to register, or anything else to start over."
                .to_string(),
            restart: "Registration was reset. Send any message to start again.".to_string(),
            registered: "The event has been registered.\nHere is your ticket.".to_string(),
            cancelled: "Event registration cancelled.".to_string(),
            commit_failed: "Could not register the event right now. Please send it again later."
                .to_string(),
            conflict: "You already host an event with this name.".to_string(),
            host_unknown: "Please sign up before registering an event.".to_string(),
            invalid_members_max: "The maximum number of participants must be a whole number of zero or more."
                .to_string(),
            invalid_lottery: "The lottery answer must be true or false.".to_string(),
            unavailable: "Something went wrong on our side. Please try again later.".to_string(),
        }
    }
}

/// Human-readable name of the value collected at a step
pub fn field_label(step: Step) -> &'static str {
    match step {
        Step::Begin | Step::EventName => "event name",
        Step::Date => "date and time",
        Step::Deadline => "entry deadline",
        Step::Location => "location",
        Step::MembersMax => "maximum number of participants",
        Step::Lottery => "lottery (true/false)",
        Step::Description => "event details",
        Step::Done => "confirmation",
    }
}

impl Prompts {
    /// Question asked when the form enters `step`
    pub fn ask(&self, step: Step) -> String {
        self.input_format.replace("{field}", field_label(step))
    }

    /// Opening reply of a fresh registration
    pub fn start(&self) -> String {
        format!("{}\n{}", self.intro, self.ask(Step::EventName))
    }

    /// Echo of every collected field followed by the confirmation hint
    pub fn summary(&self, draft: &EventDraft, confirm_token: &str) -> String {
        let rows = [
            (Step::EventName, &draft.event_name),
            (Step::Date, &draft.date),
            (Step::Deadline, &draft.deadline),
            (Step::Location, &draft.location),
            (Step::MembersMax, &draft.members_max),
            (Step::Lottery, &draft.lottery),
            (Step::Description, &draft.description),
        ];

        let mut out = self.summary_header.clone();
        for (step, value) in rows {
            out.push('\n');
            out.push_str(field_label(step));
            out.push_str(": ");
            out.push_str(value);
        }
        out.push('\n');
        out.push_str(&self.confirm_hint.replace("{token}", confirm_token));
        out
    }

    /// Error text for a field that failed to parse, followed by its question
    pub fn invalid(&self, field: DraftField) -> String {
        let reason = match field {
            DraftField::MembersMax => &self.invalid_members_max,
            DraftField::Lottery => &self.invalid_lottery,
        };
        format!("{reason}\n{}", self.ask(field.step()))
    }
}
