//! CommandHandle - client-side reference to one in-flight remote command
//!
//! The handle is the seam to the transport. Status queries and cancel requests
//! go through [`RemoteCommand`]; submission goes through [`CommandService`].
//! Neither is implemented here beyond the in-process simulator in [`crate::sim`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::completion::PushSlot;
use crate::error::TransportError;
use crate::response::CommandStatus;

/// Unique, time-ordered identifier of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the session that owns a command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque description of remote work handed to a [`CommandService`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: String,
    #[serde(default)]
    pub args: Value,
}

impl Command {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            args: Value::Null,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

/// Remote status and cancel calls for submitted commands
#[async_trait]
pub trait RemoteCommand: Send + Sync {
    /// Lightweight, non-blocking status query
    async fn status(&self, id: CommandId) -> Result<CommandStatus, TransportError>;

    /// Ask the remote side to cancel; `Ok(true)` means the request was accepted,
    /// not that the command will stop
    async fn request_cancel(&self, id: CommandId) -> Result<bool, TransportError>;
}

/// Accepts commands and returns a handle bound to each
#[async_trait]
pub trait CommandService: Send + Sync {
    async fn submit(&self, command: Command) -> Result<CommandHandle, TransportError>;
}

struct HandleInner {
    id: CommandId,
    submitted_at: DateTime<Utc>,
    session: SessionId,
    remote: Arc<dyn RemoteCommand>,
    push: Arc<PushSlot>,
}

/// Reference to exactly one submitted command
///
/// Immutable after creation and cheap to clone; clones refer to the same command.
#[derive(Clone)]
pub struct CommandHandle {
    inner: Arc<HandleInner>,
}

impl CommandHandle {
    /// Bind a handle to a command the transport has accepted
    pub fn new(id: CommandId, session: SessionId, remote: Arc<dyn RemoteCommand>, push: Arc<PushSlot>) -> Self {
        debug!(%id, %session, "CommandHandle::new: called");
        Self {
            inner: Arc::new(HandleInner {
                id,
                submitted_at: Utc::now(),
                session,
                remote,
                push,
            }),
        }
    }

    pub fn id(&self) -> CommandId {
        self.inner.id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.inner.submitted_at
    }

    pub fn session(&self) -> &SessionId {
        &self.inner.session
    }

    /// The slot the transport delivers this command's push notification into
    pub fn push_slot(&self) -> &Arc<PushSlot> {
        &self.inner.push
    }

    /// Query the remote side for the command's current status
    pub async fn status(&self) -> Result<CommandStatus, TransportError> {
        debug!(id = %self.inner.id, "CommandHandle::status: called");
        self.inner.remote.status(self.inner.id).await
    }

    /// Deliver a cancellation request to the remote side
    pub async fn request_cancel(&self) -> Result<bool, TransportError> {
        debug!(id = %self.inner.id, "CommandHandle::request_cancel: called");
        self.inner.remote.request_cancel(self.inner.id).await
    }
}

impl fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandle")
            .field("id", &self.inner.id)
            .field("submitted_at", &self.inner.submitted_at)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;
    use parking_lot::Mutex;

    struct FixedRemote {
        status: CommandStatus,
        accept_cancel: bool,
        seen: Mutex<Vec<CommandId>>,
    }

    #[async_trait]
    impl RemoteCommand for FixedRemote {
        async fn status(&self, id: CommandId) -> Result<CommandStatus, TransportError> {
            self.seen.lock().push(id);
            Ok(self.status.clone())
        }

        async fn request_cancel(&self, id: CommandId) -> Result<bool, TransportError> {
            self.seen.lock().push(id);
            Ok(self.accept_cancel)
        }
    }

    fn handle_with(remote: Arc<FixedRemote>) -> CommandHandle {
        CommandHandle::new(CommandId::new(), SessionId::new("test-session"), remote, Arc::new(PushSlot::new()))
    }

    #[tokio::test]
    async fn test_status_delegates_with_own_id() {
        let remote = Arc::new(FixedRemote {
            status: CommandStatus::Finished(Response::ok("done")),
            accept_cancel: true,
            seen: Mutex::new(Vec::new()),
        });
        let handle = handle_with(remote.clone());

        let status = handle.status().await.unwrap();
        assert_eq!(status, CommandStatus::Finished(Response::ok("done")));
        assert!(handle.request_cancel().await.unwrap());
        assert_eq!(*remote.seen.lock(), vec![handle.id(), handle.id()]);
    }

    #[test]
    fn test_clone_refers_to_same_command() {
        let remote = Arc::new(FixedRemote {
            status: CommandStatus::StillRunning,
            accept_cancel: false,
            seen: Mutex::new(Vec::new()),
        });
        let handle = handle_with(remote);
        let clone = handle.clone();

        assert_eq!(handle.id(), clone.id());
        assert_eq!(handle.submitted_at(), clone.submitted_at());
        assert_eq!(clone.session().as_str(), "test-session");
        assert!(Arc::ptr_eq(handle.push_slot(), clone.push_slot()));
    }

    #[test]
    fn test_command_ids_are_unique() {
        let a = CommandId::new();
        let b = CommandId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
    }

    #[test]
    fn test_command_deserialize_defaults_args() {
        let command: Command = serde_json::from_str(r#"{"kind":"delete"}"#).unwrap();
        assert_eq!(command, Command::new("delete"));
    }

    #[test]
    fn test_debug_omits_transport() {
        let remote = Arc::new(FixedRemote {
            status: CommandStatus::StillRunning,
            accept_cancel: false,
            seen: Mutex::new(Vec::new()),
        });
        let handle = handle_with(remote);
        let text = format!("{:?}", handle);
        assert!(text.contains("CommandHandle"));
        assert!(text.contains("test-session"));
    }
}
