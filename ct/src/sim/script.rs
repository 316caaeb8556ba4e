//! Scripts describing how a simulated command behaves

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::handle::Command;
use crate::response::Response;

/// How the simulated transport delivers the push notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushMode {
    /// Deliver as soon as the command settles
    Deliver,
    /// Never deliver; only polling can observe the outcome
    Drop,
    /// Deliver this many milliseconds after the command settles
    DelayMs(u64),
}

/// Behaviour of one simulated command
///
/// Every field has a default, so `{}` is a valid script: a command that
/// succeeds with `"done"` after 100ms and pushes its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimScript {
    /// Time until natural completion
    pub duration_ms: u64,

    /// Response produced on natural completion
    pub outcome: Response,

    pub push: PushMode,

    /// Number of initial status queries that fail with a transport error
    pub status_failures: u32,

    /// Whether cancel requests are accepted
    pub honor_cancel: bool,

    /// Time between an accepted cancel request and the `Cancelled` outcome
    pub cancel_latency_ms: u64,
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            duration_ms: 100,
            outcome: Response::ok("done"),
            push: PushMode::Deliver,
            status_failures: 0,
            honor_cancel: true,
            cancel_latency_ms: 10,
        }
    }
}

impl SimScript {
    /// Read a script from a command's arguments; null arguments mean defaults
    pub fn from_command(command: &Command) -> Result<Self, TransportError> {
        if command.args.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(command.args.clone())
            .map_err(|e| TransportError::InvalidCommand(format!("{}: {}", command.kind, e)))
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn with_outcome(mut self, outcome: Response) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_push(mut self, push: PushMode) -> Self {
        self.push = push;
        self
    }

    pub fn with_status_failures(mut self, failures: u32) -> Self {
        self.status_failures = failures;
        self
    }

    pub fn with_honor_cancel(mut self, honor: bool) -> Self {
        self.honor_cancel = honor;
        self
    }

    pub fn with_cancel_latency(mut self, latency: Duration) -> Self {
        self.cancel_latency_ms = latency.as_millis() as u64;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn cancel_latency(&self) -> Duration {
        Duration::from_millis(self.cancel_latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_args_use_defaults() {
        let script = SimScript::from_command(&Command::new("delete")).unwrap();
        assert_eq!(script, SimScript::default());
    }

    #[test]
    fn test_partial_args_fill_defaults() {
        let command = Command::new("duplicate").with_args(json!({
            "duration_ms": 5,
            "push": {"delay_ms": 40},
            "outcome": {"status": "error", "data": {"category": "Quota", "name": "Exceeded"}}
        }));

        let script = SimScript::from_command(&command).unwrap();
        assert_eq!(script.duration(), Duration::from_millis(5));
        assert_eq!(script.push, PushMode::DelayMs(40));
        assert_eq!(script.outcome, Response::error("Quota", "Exceeded"));
        assert!(script.honor_cancel);
    }

    #[test]
    fn test_push_mode_unit_variants() {
        let mode: PushMode = serde_json::from_str(r#""drop""#).unwrap();
        assert_eq!(mode, PushMode::Drop);
    }

    #[test]
    fn test_invalid_args_are_rejected() {
        let command = Command::new("delete").with_args(json!({"duration_ms": "soon"}));
        match SimScript::from_command(&command) {
            Err(TransportError::InvalidCommand(message)) => assert!(message.starts_with("delete:")),
            other => panic!("Expected InvalidCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_builders() {
        let script = SimScript::default()
            .with_duration(Duration::from_secs(2))
            .with_outcome(Response::Cancelled)
            .with_push(PushMode::Drop)
            .with_status_failures(3)
            .with_honor_cancel(false)
            .with_cancel_latency(Duration::from_millis(75));

        assert_eq!(script.duration_ms, 2000);
        assert_eq!(script.outcome, Response::Cancelled);
        assert_eq!(script.push, PushMode::Drop);
        assert_eq!(script.status_failures, 3);
        assert!(!script.honor_cancel);
        assert_eq!(script.cancel_latency(), Duration::from_millis(75));
    }
}
