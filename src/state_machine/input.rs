//! Inputs that drive form transitions

use crate::db::Event;

/// Why committing a finalized event failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitFailure {
    /// An event with the same host and name already exists
    Conflict,
    /// A referenced record (the host) does not exist
    NotFound,
    /// The gateway could not be reached or failed internally
    Transport,
}

/// Inputs that trigger state transitions
#[derive(Debug, Clone)]
pub enum Input {
    // User inputs
    Message { text: String },
    Register,
    Cancel,

    // Gateway outcomes of a commit
    CommitSucceeded { event: Event },
    CommitFailed { kind: CommitFailure },
}

impl Input {
    pub fn message(text: impl Into<String>) -> Self {
        Input::Message { text: text.into() }
    }
}
