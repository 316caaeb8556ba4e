//! SimulatedRemote - actor that plays the remote side of a command transport
//!
//! Commands run as timers inside one actor task. Status and cancel calls are
//! request/reply messages, and push notifications are delivered from a
//! dedicated OS thread, the way a real transport calls back from its own
//! dispatch thread. A settled command stays queryable for
//! `SimConfig::retain_settled_ms`, then is forgotten and answers
//! `UnknownCommand`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{SimRequest, SimStats};
use super::script::{PushMode, SimScript};
use crate::completion::PushSlot;
use crate::config::SimConfig;
use crate::error::TransportError;
use crate::handle::{Command, CommandHandle, CommandId, CommandService, RemoteCommand, SessionId};
use crate::response::{CommandStatus, Response};

/// Server-side bookkeeping for one command
struct SimCommand {
    script: SimScript,
    slot: Arc<PushSlot>,
    settled: Option<Response>,
    failures_left: u32,
    cancel_requested: bool,
}

/// Handle to send requests to the simulated remote
#[derive(Clone)]
pub struct SimulatedRemote {
    tx: mpsc::Sender<SimRequest>,
    session: SessionId,
}

impl SimulatedRemote {
    /// Spawn a new simulated remote actor
    pub fn spawn(config: &SimConfig) -> Self {
        debug!(?config, "SimulatedRemote::spawn: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));

        tokio::spawn(actor_loop(rx, tx.downgrade(), config.retain_settled()));

        info!(session = %config.session, "SimulatedRemote spawned");
        Self {
            tx,
            session: SessionId::new(config.session.clone()),
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Submit a command with an explicit script
    pub async fn submit_script(&self, script: SimScript) -> Result<CommandHandle, TransportError> {
        debug!(?script, "SimulatedRemote::submit_script: called");
        let slot = Arc::new(PushSlot::new());
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SimRequest::Submit {
                script,
                slot: slot.clone(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        let id = reply_rx.await.map_err(|_| TransportError::ChannelClosed)?;

        let remote: Arc<dyn RemoteCommand> = Arc::new(self.clone());
        Ok(CommandHandle::new(id, self.session.clone(), remote, slot))
    }

    /// Get the actor's counters
    pub async fn stats(&self) -> Result<SimStats, TransportError> {
        debug!("SimulatedRemote::stats: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SimRequest::GetStats { reply: reply_tx })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TransportError::ChannelClosed)
    }

    /// Stop the actor; later calls fail with `ChannelClosed`
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        debug!("SimulatedRemote::shutdown: called");
        self.tx
            .send(SimRequest::Shutdown)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

#[async_trait]
impl RemoteCommand for SimulatedRemote {
    async fn status(&self, id: CommandId) -> Result<CommandStatus, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SimRequest::Status { id, reply: reply_tx })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TransportError::ChannelClosed)?
    }

    async fn request_cancel(&self, id: CommandId) -> Result<bool, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SimRequest::Cancel { id, reply: reply_tx })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TransportError::ChannelClosed)?
    }
}

#[async_trait]
impl CommandService for SimulatedRemote {
    async fn submit(&self, command: Command) -> Result<CommandHandle, TransportError> {
        debug!(kind = %command.kind, "SimulatedRemote::submit: called");
        let script = SimScript::from_command(&command)?;
        self.submit_script(script).await
    }
}

/// Send `Settle` to the actor after `delay`
fn schedule_settle(tx: &mpsc::WeakSender<SimRequest>, id: CommandId, delay: Duration, response: Response) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(tx) = tx.upgrade() {
            let _ = tx.send(SimRequest::Settle { id, response }).await;
        }
    });
}

/// Hand the response to the push slot from a thread the caller does not own
fn dispatch_push(slot: Arc<PushSlot>, response: Response, delay: Duration) {
    let spawned = std::thread::Builder::new()
        .name("sim-push-dispatch".to_string())
        .spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            slot.deliver(response);
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn push dispatch thread");
    }
}

/// Send `Evict` to the actor after `delay`
fn schedule_evict(tx: &mpsc::WeakSender<SimRequest>, id: CommandId, delay: Duration) {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(tx) = tx.upgrade() {
            let _ = tx.send(SimRequest::Evict { id }).await;
        }
    });
}

async fn actor_loop(mut rx: mpsc::Receiver<SimRequest>, tx: mpsc::WeakSender<SimRequest>, retain_settled: Duration) {
    let mut commands: HashMap<CommandId, SimCommand> = HashMap::new();
    let mut stats = SimStats::default();

    info!("SimulatedRemote actor started");

    while let Some(req) = rx.recv().await {
        match req {
            SimRequest::Submit { script, slot, reply } => {
                let id = CommandId::new();
                debug!(%id, duration_ms = script.duration_ms, "Accepting command");
                schedule_settle(&tx, id, script.duration(), script.outcome.clone());
                commands.insert(
                    id,
                    SimCommand {
                        failures_left: script.status_failures,
                        script,
                        slot,
                        settled: None,
                        cancel_requested: false,
                    },
                );
                stats.submitted += 1;
                let _ = reply.send(id);
            }

            SimRequest::Status { id, reply } => {
                stats.status_queries += 1;
                let result = match commands.get_mut(&id) {
                    None => Err(TransportError::UnknownCommand(id)),
                    Some(command) if command.failures_left > 0 => {
                        command.failures_left -= 1;
                        debug!(%id, "Injecting status failure");
                        Err(TransportError::Unreachable("simulated status failure".to_string()))
                    }
                    Some(command) => Ok(match &command.settled {
                        Some(response) => CommandStatus::Finished(response.clone()),
                        None => CommandStatus::StillRunning,
                    }),
                };
                let _ = reply.send(result);
            }

            SimRequest::Cancel { id, reply } => {
                stats.cancel_requests += 1;
                let result = match commands.get_mut(&id) {
                    None => Err(TransportError::UnknownCommand(id)),
                    Some(command) if command.settled.is_some() || !command.script.honor_cancel => {
                        debug!(%id, "Rejecting cancel request");
                        Ok(false)
                    }
                    Some(command) => {
                        if !command.cancel_requested {
                            command.cancel_requested = true;
                            schedule_settle(&tx, id, command.script.cancel_latency(), Response::Cancelled);
                        }
                        debug!(%id, "Cancel request accepted");
                        Ok(true)
                    }
                };
                let _ = reply.send(result);
            }

            SimRequest::Settle { id, response } => {
                let Some(command) = commands.get_mut(&id) else {
                    continue;
                };
                if command.settled.is_some() {
                    debug!(%id, response = response.label(), "Command already settled, ignoring timer");
                    continue;
                }

                info!(%id, response = response.label(), "Command settled");
                command.settled = Some(response.clone());
                stats.settled += 1;
                schedule_evict(&tx, id, retain_settled);

                match command.script.push {
                    PushMode::Deliver => {
                        stats.pushes_sent += 1;
                        dispatch_push(command.slot.clone(), response, Duration::ZERO);
                    }
                    PushMode::DelayMs(ms) => {
                        stats.pushes_sent += 1;
                        dispatch_push(command.slot.clone(), response, Duration::from_millis(ms));
                    }
                    PushMode::Drop => {
                        debug!(%id, "Dropping push notification");
                        stats.pushes_dropped += 1;
                    }
                }
            }

            SimRequest::Evict { id } => {
                if commands.remove(&id).is_some() {
                    debug!(%id, "Evicting settled command");
                    stats.evicted += 1;
                }
            }

            SimRequest::GetStats { reply } => {
                let _ = reply.send(stats.clone());
            }

            SimRequest::Shutdown => {
                info!("SimulatedRemote shutting down");
                break;
            }
        }
    }

    info!("SimulatedRemote actor stopped");
}
