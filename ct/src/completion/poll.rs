//! Poll loop - bounded fallback when no push notification arrives
//!
//! Queries the handle's status up to `steps` times at a fixed interval. The
//! pause between attempts is a wait on the completion event, so a push that
//! lands mid-pause ends the loop at once.

use std::time::Duration;

use tracing::{debug, warn};

use crate::event::Event;
use crate::handle::CommandHandle;
use crate::response::{CommandStatus, Response};

/// How a poll run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// A status query reported the command finished
    Terminal(Response),
    /// The completion event was raised by the push path first
    PushWon,
    /// Every step ran without a terminal status
    Exhausted,
}

/// Outcome plus what the run cost
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub attempts: u32,
    pub transport_failures: u32,
}

pub struct PollLoop<'a> {
    handle: &'a CommandHandle,
    event: &'a Event,
}

impl<'a> PollLoop<'a> {
    pub fn new(handle: &'a CommandHandle, event: &'a Event) -> Self {
        Self { handle, event }
    }

    /// Poll until a terminal status, a raised event, or `steps` attempts
    ///
    /// The interval is fixed; there is no backoff. A transport failure counts
    /// as "still running" and uses up its step.
    pub async fn run_fallback(&self, steps: u32, interval: Duration) -> PollReport {
        debug!(id = %self.handle.id(), steps, ?interval, "PollLoop::run_fallback: called");
        let mut report = PollReport {
            outcome: PollOutcome::Exhausted,
            attempts: 0,
            transport_failures: 0,
        };

        for step in 0..steps {
            if self.event.is_set() {
                report.outcome = PollOutcome::PushWon;
                return finish(report);
            }

            report.attempts += 1;
            match self.handle.status().await {
                Ok(CommandStatus::Finished(response)) => {
                    debug!(step, response = response.label(), "PollLoop::run_fallback: terminal status");
                    report.outcome = PollOutcome::Terminal(response);
                    return finish(report);
                }
                Ok(CommandStatus::StillRunning) => {
                    debug!(step, "PollLoop::run_fallback: still running");
                }
                Err(e) => {
                    report.transport_failures += 1;
                    warn!(id = %self.handle.id(), step, error = %e, "Status query failed, treating as still running");
                }
            }

            if self.event.wait(interval).await {
                report.outcome = PollOutcome::PushWon;
                return finish(report);
            }
        }

        if self.event.is_set() {
            report.outcome = PollOutcome::PushWon;
        }
        finish(report)
    }
}

fn finish(report: PollReport) -> PollReport {
    debug!(
        outcome = ?report.outcome,
        attempts = report.attempts,
        transport_failures = report.transport_failures,
        "PollLoop::run_fallback: finished"
    );
    report
}
