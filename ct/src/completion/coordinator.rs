//! CompletionCoordinator - races push notification against polling
//!
//! ```text
//!   Pending ──[push | poll terminal]──────────────▶ Finalized
//!      │                                               ▲
//!      └──[cancel accepted]──▶ Cancelling ──[push | poll terminal]
//! ```
//!
//! The first terminal observation to take the finalization lock commits the
//! response; later observations are discarded. The completion event is raised
//! only after the commit, so every waiter sees the same committed value.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::listener::CompletionListener;
use super::poll::{PollLoop, PollOutcome, PollReport};
use super::stats::{CompletionStats, FinalizedBy};
use crate::event::Event;
use crate::handle::CommandHandle;
use crate::response::{AwaitOutcome, Response};

/// Slack added to a caller's `steps * interval` bound to cover one status round trip
pub const ROUND_TRIP_GRACE: Duration = Duration::from_millis(250);

/// Lifecycle of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Pending,
    Cancelling,
    Finalized,
}

/// The single poll run shared by all current waiters
struct PollRun {
    finished: Arc<Event>,
    task: JoinHandle<()>,
}

/// State guarded by the finalization lock
struct Inner {
    state: CoordinatorState,
    poll_run: Option<PollRun>,
    stats: CompletionStats,
}

struct CoordinatorCore {
    handle: CommandHandle,
    completed: Event,
    /// Written once, under the `inner` lock; read lock-free afterwards
    response: OnceLock<Arc<Response>>,
    inner: Mutex<Inner>,
    cancel_gate: tokio::sync::Mutex<()>,
}

impl CoordinatorCore {
    /// Commit `response` unless another path already did
    fn finalize(&self, response: Response, by: FinalizedBy) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state == CoordinatorState::Finalized {
                inner.stats.discarded_observations += 1;
                debug!(
                    id = %self.handle.id(),
                    ?by,
                    response = response.label(),
                    "CoordinatorCore::finalize: already finalized, discarding"
                );
                return false;
            }

            let previous = inner.state;
            // The state tag and the cell move together under the lock
            let _ = self.response.set(Arc::new(response));
            inner.state = CoordinatorState::Finalized;
            inner.stats.commits += 1;
            inner.stats.finalized_by = Some(by);
            info!(id = %self.handle.id(), ?previous, ?by, "Command finalized");
        }

        self.completed.set();
        true
    }

    fn record_poll(&self, report: PollReport) {
        {
            let mut inner = self.inner.lock();
            inner.stats.status_queries += u64::from(report.attempts);
            inner.stats.transport_failures += u64::from(report.transport_failures);
        }

        match report.outcome {
            PollOutcome::Terminal(response) => {
                self.finalize(response, FinalizedBy::Poll);
            }
            PollOutcome::PushWon => {
                debug!(id = %self.handle.id(), "CoordinatorCore::record_poll: push path won");
            }
            PollOutcome::Exhausted => {
                info!(id = %self.handle.id(), attempts = report.attempts, "Poll budget exhausted");
            }
        }
    }
}

impl CompletionListener for CoordinatorCore {
    fn on_finished(&self, response: Response) {
        debug!(id = %self.handle.id(), response = response.label(), "CoordinatorCore::on_finished: push received");
        self.inner.lock().stats.pushes_received += 1;
        self.finalize(response, FinalizedBy::Push);
    }
}

/// Tracks one submitted command to its terminal response
///
/// Share it behind an `Arc` to wait from several tasks; they all join one
/// poll run and observe the same committed response.
pub struct CompletionCoordinator {
    core: Arc<CoordinatorCore>,
}

impl CompletionCoordinator {
    /// Create a coordinator and attach it to the handle's push slot
    pub fn new(handle: CommandHandle) -> Self {
        debug!(id = %handle.id(), "CompletionCoordinator::new: called");
        let core = Arc::new(CoordinatorCore {
            handle,
            completed: Event::new(),
            response: OnceLock::new(),
            inner: Mutex::new(Inner {
                state: CoordinatorState::Pending,
                poll_run: None,
                stats: CompletionStats::default(),
            }),
            cancel_gate: tokio::sync::Mutex::new(()),
        });

        let weak = Arc::downgrade(&core);
        let listener: Weak<dyn CompletionListener> = weak;
        core.handle.push_slot().attach(listener);

        Self { core }
    }

    pub fn handle(&self) -> &CommandHandle {
        &self.core.handle
    }

    pub fn state(&self) -> CoordinatorState {
        self.core.inner.lock().state
    }

    /// The committed response, if finalized
    pub fn response(&self) -> Option<Arc<Response>> {
        self.core.response.get().cloned()
    }

    pub fn stats(&self) -> CompletionStats {
        self.core.inner.lock().stats.clone()
    }

    /// Wait until the command is finalized or the bound is exhausted
    ///
    /// Starts the poll loop if no run is in progress, otherwise joins the
    /// current one. If the run ends before this caller's own `steps * interval`
    /// budget is spent, a fresh run is started for the steps that remain.
    /// Returns `TimedOut` only once that budget (plus [`ROUND_TRIP_GRACE`]) is
    /// used up with no terminal response. The command keeps running remotely;
    /// call again to extend the bound.
    pub async fn wait(&self, steps: u32, interval: Duration) -> AwaitOutcome {
        debug!(id = %self.core.handle.id(), steps, ?interval, "CompletionCoordinator::wait: called");
        if let Some(response) = self.core.response.get() {
            debug!("CompletionCoordinator::wait: already finalized");
            return AwaitOutcome::Completed(response.clone());
        }

        let poll_deadline = Instant::now().checked_add(interval.saturating_mul(steps));
        let deadline = poll_deadline.and_then(|d| d.checked_add(ROUND_TRIP_GRACE));
        let mut run_steps = steps;

        loop {
            let run_finished = self.join_or_start_poll_run(run_steps, interval);
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };

            tokio::select! {
                _ = self.core.completed.wait(remaining) => {}
                _ = run_finished.wait(remaining) => {}
            }

            if let Some(response) = self.core.response.get() {
                return AwaitOutcome::Completed(response.clone());
            }
            if !run_finished.is_set() {
                break;
            }

            run_steps = steps_left(poll_deadline, interval);
            if run_steps == 0 {
                break;
            }
            debug!(run_steps, "CompletionCoordinator::wait: poll run ended inside this caller's bound, continuing");
        }

        info!(id = %self.core.handle.id(), steps, ?interval, "Wait bound exhausted without a terminal response");
        AwaitOutcome::TimedOut
    }

    /// Request cancellation of the remote command
    ///
    /// Returns whether the request was accepted. Acceptance does not finalize
    /// anything; the terminal response still arrives by push or poll and may
    /// be `Ok` or `Error` if the command finished first. Repeated calls while
    /// cancelling return `true` without contacting the remote side; calls
    /// after finalization return `false`.
    pub async fn cancel(&self) -> bool {
        debug!(id = %self.core.handle.id(), "CompletionCoordinator::cancel: called");
        let _gate = self.core.cancel_gate.lock().await;

        match self.state() {
            CoordinatorState::Finalized => {
                debug!("CompletionCoordinator::cancel: already finalized");
                return false;
            }
            CoordinatorState::Cancelling => {
                debug!("CompletionCoordinator::cancel: already cancelling");
                return true;
            }
            CoordinatorState::Pending => {}
        }

        self.core.inner.lock().stats.cancel_requests += 1;
        let accepted = match self.core.handle.request_cancel().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(id = %self.core.handle.id(), error = %e, "Cancel request could not be delivered");
                false
            }
        };

        if accepted {
            let mut inner = self.core.inner.lock();
            if inner.state == CoordinatorState::Pending {
                inner.state = CoordinatorState::Cancelling;
            }
        }
        debug!(accepted, "CompletionCoordinator::cancel: done");
        accepted
    }

    fn join_or_start_poll_run(&self, steps: u32, interval: Duration) -> Arc<Event> {
        let mut inner = self.core.inner.lock();
        if let Some(run) = &inner.poll_run
            && !run.finished.is_set()
        {
            debug!("CompletionCoordinator::wait: joining poll run in progress");
            return run.finished.clone();
        }

        debug!(steps, ?interval, "CompletionCoordinator::wait: starting poll run");
        let finished = Arc::new(Event::new());
        let core = self.core.clone();
        let done = finished.clone();
        let task = tokio::spawn(async move {
            let report = PollLoop::new(&core.handle, &core.completed)
                .run_fallback(steps, interval)
                .await;
            core.record_poll(report);
            done.set();
        });

        inner.stats.poll_runs += 1;
        inner.poll_run = Some(PollRun {
            finished: finished.clone(),
            task,
        });
        finished
    }
}

/// Whole poll steps that still fit before `poll_deadline`
fn steps_left(poll_deadline: Option<Instant>, interval: Duration) -> u32 {
    if interval.is_zero() {
        return 0;
    }
    let Some(deadline) = poll_deadline else {
        return u32::MAX;
    };
    let left = deadline.saturating_duration_since(Instant::now());
    u32::try_from(left.as_nanos() / interval.as_nanos()).unwrap_or(u32::MAX)
}

impl Drop for CompletionCoordinator {
    fn drop(&mut self) {
        if let Some(run) = self.core.inner.lock().poll_run.take() {
            run.task.abort();
        }
    }
}
