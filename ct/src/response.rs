//! Terminal outcomes of a remote command

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tagged result of one remote command
///
/// Exactly one `Response` is committed per command; once committed it is
/// shared immutably (see [`AwaitOutcome`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Response {
    /// The command succeeded and produced a payload
    Ok(Value),

    /// The command itself failed on the remote side
    Error {
        category: String,
        name: String,
        #[serde(default)]
        details: BTreeMap<String, String>,
    },

    /// The command was cancelled before it completed
    Cancelled,
}

impl Response {
    /// Create a successful response
    pub fn ok(payload: impl Into<Value>) -> Self {
        Response::Ok(payload.into())
    }

    /// Create an error response without details
    pub fn error(category: impl Into<String>, name: impl Into<String>) -> Self {
        Response::Error {
            category: category.into(),
            name: name.into(),
            details: BTreeMap::new(),
        }
    }

    /// Add a detail entry to an error response; no-op for other variants
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Response::Error { details, .. } = &mut self {
            details.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Response::Cancelled)
    }

    /// Short variant name for logging
    pub fn label(&self) -> &'static str {
        match self {
            Response::Ok(_) => "ok",
            Response::Error { .. } => "error",
            Response::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok(payload) => write!(f, "ok: {}", payload),
            Response::Error { category, name, details } => {
                write!(f, "error: {}/{}", category, name)?;
                for (key, value) in details {
                    write!(f, " {}={}", key, value)?;
                }
                Ok(())
            }
            Response::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Answer to a non-blocking status query
#[derive(Debug, Clone, PartialEq)]
pub enum CommandStatus {
    StillRunning,
    Finished(Response),
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Finished(_))
    }
}

/// Result of waiting on a command
///
/// `TimedOut` is a local condition: the wait bound was exhausted with no
/// terminal signal. The command may still be running remotely and the caller
/// can wait again.
#[derive(Debug, Clone)]
pub enum AwaitOutcome {
    Completed(Arc<Response>),
    TimedOut,
}

impl AwaitOutcome {
    /// The committed response, if the command finished
    pub fn response(&self) -> Option<&Arc<Response>> {
        match self {
            AwaitOutcome::Completed(response) => Some(response),
            AwaitOutcome::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, AwaitOutcome::TimedOut)
    }
}

impl PartialEq for AwaitOutcome {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AwaitOutcome::Completed(a), AwaitOutcome::Completed(b)) => a == b,
            (AwaitOutcome::TimedOut, AwaitOutcome::TimedOut) => true,
            _ => false,
        }
    }
}
