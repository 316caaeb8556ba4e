//! CommandTracker - await the outcome of asynchronous remote commands
//!
//! A command is submitted to a remote service and runs there. Its terminal
//! [`Response`] can reach the client two ways: a push notification from the
//! transport, or a status query issued by the client. [`CompletionCoordinator`]
//! races both and commits the first terminal response it sees, exactly once.
//!
//! # Example
//!
//! ```ignore
//! use commandtracker::{CompletionCoordinator, SimScript, SimulatedRemote};
//! use commandtracker::config::SimConfig;
//!
//! let remote = SimulatedRemote::spawn(&SimConfig::default());
//! let handle = remote.submit_script(SimScript::default()).await?;
//! let coordinator = CompletionCoordinator::new(handle);
//! let outcome = coordinator.wait(10, Duration::from_millis(500)).await;
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod response;
pub mod sim;

pub use completion::{CompletionCoordinator, CompletionListener, CompletionStats, CoordinatorState, FinalizedBy, PushSlot};
pub use error::TransportError;
pub use event::Event;
pub use handle::{Command, CommandHandle, CommandId, CommandService, RemoteCommand, SessionId};
pub use response::{AwaitOutcome, CommandStatus, Response};
pub use sim::{PushMode, SimScript, SimulatedRemote};
