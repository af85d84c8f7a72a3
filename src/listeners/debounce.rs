// src/listeners/debounce.rs
//! Trailing-edge debounce
//!
//! Rapid successive calls collapse into a single trailing invocation of the
//! last call's closure after the configured quiet period. A zero duration
//! fires every call immediately.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Trailing-edge debouncer over a single pending action
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action`, replacing any action still waiting
    pub fn call<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.delay.is_zero() {
            action();
            return;
        }

        let mut pending = self.pending.lock();
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    /// Drop any action still waiting
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
