//! Simulated remote messages
//!
//! Requests for the actor pattern.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;

use super::script::SimScript;
use crate::completion::PushSlot;
use crate::error::TransportError;
use crate::handle::CommandId;
use crate::response::{CommandStatus, Response};

/// Counters kept by the simulated remote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub submitted: u64,
    pub settled: u64,
    pub status_queries: u64,
    pub cancel_requests: u64,
    pub pushes_sent: u64,
    pub pushes_dropped: u64,
    pub evicted: u64,
}

/// Requests sent to the simulated remote actor
#[derive(Debug)]
pub enum SimRequest {
    Submit {
        script: SimScript,
        slot: Arc<PushSlot>,
        reply: oneshot::Sender<CommandId>,
    },
    Status {
        id: CommandId,
        reply: oneshot::Sender<Result<CommandStatus, TransportError>>,
    },
    Cancel {
        id: CommandId,
        reply: oneshot::Sender<Result<bool, TransportError>>,
    },

    /// A completion or cancellation timer fired
    Settle { id: CommandId, response: Response },

    /// A settled command's retention period ran out
    Evict { id: CommandId },

    GetStats {
        reply: oneshot::Sender<SimStats>,
    },

    Shutdown,
}
