//! Effects produced by state transitions

use crate::db::Event;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Save the new session state
    PersistSession,

    /// Drop the user's session
    InvalidateSession,

    /// Send a text reply to the user
    Reply { text: String },

    /// Add the finalized event through the gateway
    CommitEvent { event: Event },

    /// Render the ticket for a committed event and send it
    RenderTicket { event: Event },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }
}
