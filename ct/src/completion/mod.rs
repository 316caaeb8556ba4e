//! Completion tracking for submitted commands
//!
//! A [`CompletionCoordinator`] wraps a [`crate::CommandHandle`] and races two
//! sources of truth for the command's terminal response:
//! - **Push:** the transport delivers into the handle's [`PushSlot`], which
//!   forwards to the coordinator's [`CompletionListener`]
//! - **Poll:** a bounded, fixed-interval [`PollLoop`] querying the handle's status
//!
//! Whichever observes a terminal response first commits it, exactly once.

mod coordinator;
mod listener;
mod poll;
mod stats;

pub use coordinator::{CompletionCoordinator, CoordinatorState, ROUND_TRIP_GRACE};
pub use listener::{CompletionListener, PushSlot};
pub use poll::{PollLoop, PollOutcome, PollReport};
pub use stats::{CompletionStats, FinalizedBy};
