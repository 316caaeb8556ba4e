//! Transport error types
//!
//! Only failures of the transport itself are errors. A remote command that
//! failed, was cancelled, or outlived the caller's wait bound is reported as
//! data through [`crate::Response`] and [`crate::AwaitOutcome`].

use thiserror::Error;

use crate::handle::CommandId;

/// Errors raised when a status query, cancel request or submission could not
/// reach the remote side
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    #[error("Transport channel closed")]
    ChannelClosed,

    #[error("Unknown command: {0}")]
    UnknownCommand(CommandId),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl TransportError {
    /// Check if retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Unreachable(_) => true,
            TransportError::ChannelClosed => false,
            TransportError::UnknownCommand(_) => false,
            TransportError::InvalidCommand(_) => false,
        }
    }
}
