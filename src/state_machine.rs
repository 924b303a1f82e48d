//! Registration form state machine
//!
//! Pure transitions over a per-user session; the runtime executes the effects.

mod effect;
mod input;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use input::{CommitFailure, Input};
pub use state::{DraftField, EventDraft, FormContext, FormState, Step};
pub use transition::{transition, validate, TransitionError, TransitionResult, ValidationError};
