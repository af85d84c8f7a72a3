// src/listeners/navigation.rs
//! Canonical navigation observer
//!
//! The host environment owns the navigation primitives; the agent only
//! subscribes. This replaces wrapping or overwriting global history
//! functions at runtime — repeated install/uninstall cycles subscribe and
//! drop receivers instead of double-patching anything.

use tokio::sync::broadcast;
use tracing::debug;

/// How a client-side navigation was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// A new history entry was pushed
    Push,

    /// The current history entry was replaced
    Replace,

    /// Back/forward traversal
    Pop,

    /// Fragment-only change
    HashChange,
}

/// One client-side navigation notification
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    pub kind: NavigationKind,
}

impl NavigationEvent {
    pub fn new(kind: NavigationKind) -> Self {
        Self { kind }
    }
}

/// Source of navigation notifications, provided by the host environment
pub trait NavigationObserver: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<NavigationEvent>;
}

/// Default observer: the host pushes events, subscribers receive them
pub struct NavigationHub {
    sender: broadcast::Sender<NavigationEvent>,
}

impl NavigationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Publish a navigation to every active subscriber
    pub fn notify(&self, event: NavigationEvent) {
        if self.sender.send(event).is_err() {
            debug!("Navigation event dropped: no active subscribers");
        }
    }
}

impl Default for NavigationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationObserver for NavigationHub {
    fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.sender.subscribe()
    }
}
