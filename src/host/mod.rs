// src/host/mod.rs
//! Host environment boundary
//!
//! The agent is embedded in a host it does not control. Everything it needs
//! from that host comes in through this module:
//!
//! - **PageSnapshot**: the page state read at event time
//! - **HostPage**: snapshot supplier plus the forced opt-out signal
//! - **PersistedStore**: key-value storage surviving host restarts
//!
//! The host page signal takes precedence over everything else: when
//! [`HostPage::force_opt_out`] returns true, no tracking happens regardless
//! of persisted state.

pub mod storage;

// Re-export commonly used types
pub use storage::{MemoryStore, PersistedStore, SqliteStore};

use parking_lot::RwLock;

/// Snapshot of the observable page state, taken at call time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSnapshot {
    /// Page hostname (e.g. "shop.example.com")
    pub hostname: String,

    /// Current pathname, always starting with "/"
    pub pathname: String,

    /// Raw query string including the leading "?", or empty
    pub querystring: String,

    /// Document title
    pub title: String,

    /// Referrer URL, or empty
    pub referrer: String,

    /// Viewport width in CSS pixels
    pub viewport_width: u32,

    /// Viewport height in CSS pixels
    pub viewport_height: u32,

    /// BCP 47 locale tag (e.g. "en-US")
    pub locale: String,
}

/// Supplier of page state and the embedding-page opt-out signal
pub trait HostPage: Send + Sync {
    /// Read the current page state
    fn snapshot(&self) -> PageSnapshot;

    /// Well-known host flag forcing opt-out regardless of persisted state
    fn force_opt_out(&self) -> bool {
        false
    }
}

/// A [`HostPage`] backed by a snapshot the host updates imperatively
///
/// Hosts without a live page model set the snapshot whenever their view
/// changes; the agent reads whatever was last set.
pub struct StaticPage {
    snapshot: RwLock<PageSnapshot>,
    force_opt_out: RwLock<bool>,
}

impl StaticPage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            force_opt_out: RwLock::new(false),
        }
    }

    /// Replace the current snapshot
    pub fn set_snapshot(&self, snapshot: PageSnapshot) {
        *self.snapshot.write() = snapshot;
    }

    /// Update only the path and query of the current snapshot
    pub fn set_location(&self, pathname: impl Into<String>, querystring: impl Into<String>) {
        let mut snap = self.snapshot.write();
        snap.pathname = pathname.into();
        snap.querystring = querystring.into();
    }

    /// Set the embedding-page opt-out signal
    pub fn set_force_opt_out(&self, value: bool) {
        *self.force_opt_out.write() = value;
    }
}

impl HostPage for StaticPage {
    fn snapshot(&self) -> PageSnapshot {
        self.snapshot.read().clone()
    }

    fn force_opt_out(&self) -> bool {
        *self.force_opt_out.read()
    }
}
