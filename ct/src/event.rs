//! Event - broadcast-wake boolean flag with timed wait
//!
//! An `Event` is raised once a command settles. Any number of waiters, async
//! tasks or plain OS threads, block on it and are all released by a single
//! `set()`. Waiting on an already-raised event returns immediately.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use tracing::debug;

/// Thread-safe boolean flag with broadcast wake-up
///
/// The flag is guarded by a mutex shared by `set()` and both wait paths, so a
/// waiter that observed `false` is always woken by the next `set()`.
#[derive(Debug, Default)]
pub struct Event {
    flag: Mutex<bool>,
    cond: Condvar,
    notify: Notify,
}

impl Event {
    /// Create a new event in the cleared state
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every current waiter
    ///
    /// Repeated calls leave the flag raised; each call still broadcasts.
    pub fn set(&self) {
        let mut flag = self.flag.lock();
        let was_set = *flag;
        *flag = true;
        self.cond.notify_all();
        self.notify.notify_waiters();
        debug!(was_set, "Event::set");
    }

    /// Lower the flag without waking anyone
    pub fn clear(&self) {
        *self.flag.lock() = false;
        debug!("Event::clear");
    }

    /// Non-blocking read of the current flag value
    pub fn is_set(&self) -> bool {
        *self.flag.lock()
    }

    /// Wait asynchronously until the flag is raised or `timeout` elapses
    ///
    /// Returns whether the flag was observed raised.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now().checked_add(timeout);

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent set() cannot slip between
            notified.as_mut().enable();

            if self.is_set() {
                return true;
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.is_set();
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Block the calling thread until the flag is raised or `timeout` elapses
    ///
    /// For threads outside an async runtime; inside a runtime use [`Event::wait`].
    pub fn wait_blocking(&self, timeout: Duration) -> bool {
        let mut flag = self.flag.lock();
        if *flag {
            return true;
        }

        let deadline = std::time::Instant::now().checked_add(timeout);
        while !*flag {
            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut flag, deadline).timed_out() {
                        return *flag;
                    }
                }
                None => self.cond.wait(&mut flag),
            }
        }
        true
    }
}
