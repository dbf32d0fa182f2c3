//! Dialogue state machine
//!
//! Pure transitions over a hierarchical state plus a context record. The
//! runtime executes the returned effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{GameContext, GameState};
pub use transition::{start, transition, TransitionError, TransitionResult};
