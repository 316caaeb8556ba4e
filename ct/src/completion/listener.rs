//! Push-notification endpoint
//!
//! The transport invokes [`PushSlot::deliver`] from its own dispatch thread
//! when a command finishes. The slot forwards the response to each attached
//! [`CompletionListener`] at most once, and keeps it for listeners that attach
//! later.

use std::fmt;
use std::sync::Weak;

use parking_lot::Mutex;
use tracing::debug;

use crate::response::Response;

/// Single-method capability the transport calls when a command finishes
///
/// Implementations must not block the calling thread and must not panic.
pub trait CompletionListener: Send + Sync {
    fn on_finished(&self, response: Response);
}

#[derive(Default)]
struct SlotState {
    listeners: Vec<Weak<dyn CompletionListener>>,
    response: Option<Response>,
    delivered: bool,
}

/// Delivery point shared between a command's handle and its transport
///
/// Every listener attached to the slot receives the response once, so
/// several coordinators built from clones of one handle all see the push.
pub struct PushSlot {
    state: Mutex<SlotState>,
}

impl fmt::Debug for PushSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PushSlot")
            .field("listeners", &state.listeners.len())
            .field("response", &state.response.as_ref().map(Response::label))
            .field("delivered", &state.delivered)
            .finish()
    }
}

impl Default for PushSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PushSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Deliver the command's terminal response
    ///
    /// Returns `true` if the response was handed to at least one listener or
    /// parked for later ones, `false` if it was dropped (duplicate delivery,
    /// or every attached listener is gone). Listeners run outside the slot
    /// lock.
    pub fn deliver(&self, response: Response) -> bool {
        debug!(response = response.label(), "PushSlot::deliver: called");
        let listeners: Vec<_> = {
            let mut state = self.state.lock();
            if state.response.is_some() {
                debug!("PushSlot::deliver: response already received, ignoring duplicate");
                return false;
            }
            state.response = Some(response.clone());
            if state.listeners.is_empty() {
                debug!("PushSlot::deliver: no listener yet, parking response");
                return true;
            }
            state.listeners.iter().filter_map(Weak::upgrade).collect()
        };

        if listeners.is_empty() {
            debug!("PushSlot::deliver: every listener dropped, discarding response");
            return false;
        }

        self.state.lock().delivered = true;
        for listener in listeners {
            listener.on_finished(response.clone());
        }
        true
    }

    /// Attach a listener that receives the push notification
    ///
    /// A response that already arrived is replayed to the new listener
    /// immediately, on the caller's thread.
    pub fn attach(&self, listener: Weak<dyn CompletionListener>) {
        debug!("PushSlot::attach: called");
        let replay = {
            let mut state = self.state.lock();
            state.listeners.retain(|l| l.strong_count() > 0);
            state.listeners.push(listener.clone());
            if state.listeners.len() > 1 {
                debug!(listeners = state.listeners.len(), "PushSlot::attach: sharing slot between listeners");
            }
            let replay = state.response.clone();
            if replay.is_some() {
                state.delivered = true;
            }
            replay
        };

        if let Some(response) = replay {
            debug!("PushSlot::attach: replaying received response");
            if let Some(listener) = listener.upgrade() {
                listener.on_finished(response);
            }
        }
    }

    /// Whether a response has already been handed to a listener
    pub fn is_delivered(&self) -> bool {
        self.state.lock().delivered
    }
}
