//! Pure state transition function
//!
//! Given the same session, context and input, `transition` always produces the
//! same new session and effects. All I/O happens in the runtime.

use super::state::{DraftField, EventDraft, FormContext, FormState};
use super::{CommitFailure, Effect, Input};
use crate::session::Session;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Session) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// A draft field that does not parse into its typed value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("maximum participants is not a non-negative integer: {0:?}")]
    MembersMax(String),
    #[error("lottery is not a boolean: {0:?}")]
    Lottery(String),
}

impl ValidationError {
    pub fn field(&self) -> DraftField {
        match self {
            ValidationError::MembersMax(_) => DraftField::MembersMax,
            ValidationError::Lottery(_) => DraftField::Lottery,
        }
    }
}

/// Pure transition function
pub fn transition(
    session: &Session,
    context: &FormContext,
    input: Input,
) -> Result<TransitionResult, TransitionError> {
    let prompts = &context.prompts;

    match (&session.form, input) {
        // Register always starts over and asks the first question in the same turn
        (_, Input::Register) => {
            let fresh = Session {
                host_id: context.sender_id.clone(),
                form: FormState::EventName,
                ..Session::new(session.user_id.clone())
            };
            Ok(TransitionResult::new(fresh)
                .with_effect(Effect::InvalidateSession)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::reply(prompts.start())))
        }

        (_, Input::Cancel) => Ok(TransitionResult::new(Session::new(session.user_id.clone()))
            .with_effect(Effect::InvalidateSession)
            .with_effect(Effect::reply(prompts.cancelled.clone()))),

        // Begin ignores the text and records who is hosting
        (FormState::Begin, Input::Message { .. }) => {
            let next = Session {
                host_id: context.sender_id.clone(),
                form: FormState::EventName,
                confirmed: false,
                ..session.clone()
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::reply(prompts.start())))
        }

        // Re-entering a field that failed to parse
        (
            FormState::Done {
                draft,
                fixing: Some(field),
            },
            Input::Message { text },
        ) => {
            let mut draft = draft.clone();
            draft.set(*field, text);
            let reply = prompts.summary(&draft, &context.confirm_token);
            let next = Session {
                form: FormState::Done {
                    draft,
                    fixing: None,
                },
                confirmed: false,
                ..session.clone()
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::reply(reply)))
        }

        (FormState::Done { draft, fixing: None }, Input::Message { text })
            if text.trim() == context.confirm_token =>
        {
            Ok(confirm(session, context, draft))
        }

        // Anything but the confirm token discards the draft
        (FormState::Done { .. }, Input::Message { .. }) => {
            let next = Session {
                form: FormState::Begin,
                confirmed: false,
                ..session.clone()
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::reply(prompts.restart.clone())))
        }

        (form, Input::Message { text }) => {
            let form = form.clone().fill(text);
            let reply = match &form {
                FormState::Done { draft, .. } => prompts.summary(draft, &context.confirm_token),
                other => prompts.ask(other.step()),
            };
            let next = Session {
                form,
                ..session.clone()
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::reply(reply)))
        }

        (FormState::Done { .. }, Input::CommitSucceeded { event }) if session.confirmed => {
            Ok(TransitionResult::new(Session::new(session.user_id.clone()))
                .with_effect(Effect::InvalidateSession)
                .with_effect(Effect::reply(prompts.registered.clone()))
                .with_effect(Effect::RenderTicket { event }))
        }

        // The session stays confirmed at Done so the user can retry
        (FormState::Done { .. }, Input::CommitFailed { kind }) if session.confirmed => {
            let text = match kind {
                CommitFailure::Conflict => prompts.conflict.clone(),
                CommitFailure::NotFound => prompts.host_unknown.clone(),
                CommitFailure::Transport => prompts.commit_failed.clone(),
            };
            Ok(TransitionResult::new(session.clone()).with_effect(Effect::reply(text)))
        }

        (form, Input::CommitSucceeded { .. } | Input::CommitFailed { .. }) => {
            Err(TransitionError::InvalidTransition(format!(
                "commit outcome at step {} (confirmed: {})",
                form.step(),
                session.confirmed
            )))
        }
    }
}

/// Confirm token at `Done`: commit when the draft parses, otherwise ask again
/// for the first field that failed
fn confirm(session: &Session, context: &FormContext, draft: &EventDraft) -> TransitionResult {
    match validate(draft) {
        Ok((members_max, lottery)) => {
            let event = draft
                .clone()
                .into_event(session.host_id.clone(), members_max, lottery);
            let next = Session {
                confirmed: true,
                ..session.clone()
            };
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::CommitEvent { event })
        }
        Err(e) => {
            let field = e.field();
            let next = Session {
                form: FormState::Done {
                    draft: draft.clone(),
                    fixing: Some(field),
                },
                confirmed: false,
                ..session.clone()
            };
            TransitionResult::new(next)
                .with_effect(Effect::PersistSession)
                .with_effect(Effect::reply(context.prompts.invalid(field)))
        }
    }
}

/// Parse the typed fields of a draft
pub fn validate(draft: &EventDraft) -> Result<(i64, bool), ValidationError> {
    let members_max = parse_members_max(&draft.members_max)?;
    let lottery = parse_lottery(&draft.lottery)?;
    Ok((members_max, lottery))
}

fn parse_members_max(raw: &str) -> Result<i64, ValidationError> {
    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(ValidationError::MembersMax(raw.to_string())),
    }
}

fn parse_lottery(raw: &str) -> Result<bool, ValidationError> {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ValidationError::Lottery(raw.to_string())),
    }
}
