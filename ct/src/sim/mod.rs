//! In-process simulated remote
//!
//! Plays the server side of the command transport: runs each submitted
//! command on a timer, answers status and cancel queries, and pushes the
//! terminal response from a separate thread. Each command's behaviour is
//! scripted through [`SimScript`].

mod messages;
mod script;
mod service;

pub use messages::{SimRequest, SimStats};
pub use script::{PushMode, SimScript};
pub use service::SimulatedRemote;
