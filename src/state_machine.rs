//! Turn state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! runtime feeds [`Event`]s into [`transition`] and performs the returned
//! [`Effect`]s in order.

mod effect;
mod event;
mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Notice};
pub use event::Event;
pub use state::TurnState;
pub use transition::{transition, TransitionError, TransitionResult, FOLLOWUP_FALLBACK_MESSAGE};
