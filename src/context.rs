// src/context.rs
//! Explicit agent context
//!
//! One constructed object carries everything the subsystems share: the
//! configuration store, the host boundary, persisted storage, the
//! transport, and the identity/opt-out state. Nothing in the crate lives in
//! module-scope globals; every component receives this context at
//! construction time.

use crate::config::ConfigStore;
use crate::host::{HostPage, PersistedStore};
use crate::transport::Transport;
use crate::utils::errors::Result;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Storage key for the identified user id
pub const USER_ID_KEY: &str = "pagepulse.user_id";

/// Storage key for the persisted opt-out flag
pub const OPT_OUT_KEY: &str = "pagepulse.opt_out";

/// Shared state passed to every component at construction time
pub struct AgentContext {
    pub config: ConfigStore,
    pub host: Arc<dyn HostPage>,
    pub store: Arc<dyn PersistedStore>,
    pub transport: Arc<dyn Transport>,

    // Caches over the persisted store, loaded once at construction.
    user_id: RwLock<Option<String>>,
    opted_out: AtomicBool,
}

impl AgentContext {
    pub fn new(
        config: ConfigStore,
        host: Arc<dyn HostPage>,
        store: Arc<dyn PersistedStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let user_id = store.get(USER_ID_KEY);
        let opted_out = store.get(OPT_OUT_KEY).as_deref() == Some("1");

        if opted_out {
            debug!("Persisted opt-out flag is set");
        }

        Self {
            config,
            host,
            store,
            transport,
            user_id: RwLock::new(user_id),
            opted_out: AtomicBool::new(opted_out),
        }
    }

    /// The identified user id, if any
    pub fn user_id(&self) -> Option<String> {
        self.user_id.read().clone()
    }

    /// Associate subsequent events with a user id, persisted across restarts
    pub fn identify(&self, user_id: &str) -> Result<()> {
        self.store.set(USER_ID_KEY, user_id)?;
        *self.user_id.write() = Some(user_id.to_string());
        info!("User identified");
        Ok(())
    }

    /// Forget the identified user
    pub fn clear_identity(&self) -> Result<()> {
        self.store.remove(USER_ID_KEY)?;
        *self.user_id.write() = None;
        Ok(())
    }

    /// Persistently suppress all tracking for this host
    pub fn opt_out(&self) -> Result<()> {
        self.store.set(OPT_OUT_KEY, "1")?;
        self.opted_out.store(true, Ordering::SeqCst);
        info!("Tracking opt-out enabled");
        Ok(())
    }

    /// Re-enable tracking previously suppressed by [`opt_out`](Self::opt_out)
    pub fn opt_in(&self) -> Result<()> {
        self.store.remove(OPT_OUT_KEY)?;
        self.opted_out.store(false, Ordering::SeqCst);
        info!("Tracking opt-out cleared");
        Ok(())
    }

    /// Whether tracking is suppressed, by persisted flag or host signal
    pub fn is_opted_out(&self) -> bool {
        self.host.force_opt_out() || self.opted_out.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MemoryStore, PageSnapshot, StaticPage};
    use crate::transport::testing::RecordingTransport;

    fn context_with_store(store: Arc<dyn PersistedStore>) -> AgentContext {
        AgentContext::new(
            ConfigStore::new(),
            Arc::new(StaticPage::new(PageSnapshot::default())),
            store,
            Arc::new(RecordingTransport::new()),
        )
    }

    #[test]
    fn test_identity_round_trip() {
        let ctx = context_with_store(Arc::new(MemoryStore::new()));
        assert_eq!(ctx.user_id(), None);

        ctx.identify("u_1").unwrap();
        assert_eq!(ctx.user_id(), Some("u_1".to_string()));

        ctx.clear_identity().unwrap();
        assert_eq!(ctx.user_id(), None);
    }

    #[test]
    fn test_opt_out_round_trip() {
        let ctx = context_with_store(Arc::new(MemoryStore::new()));
        assert!(!ctx.is_opted_out());

        ctx.opt_out().unwrap();
        assert!(ctx.is_opted_out());

        ctx.opt_in().unwrap();
        assert!(!ctx.is_opted_out());
    }

    #[test]
    fn test_persisted_state_is_loaded_at_construction() {
        let store = Arc::new(MemoryStore::new());
        store.set(USER_ID_KEY, "u_persisted").unwrap();
        store.set(OPT_OUT_KEY, "1").unwrap();

        let ctx = context_with_store(store);
        assert_eq!(ctx.user_id(), Some("u_persisted".to_string()));
        assert!(ctx.is_opted_out());
    }

    #[test]
    fn test_host_signal_overrides_persisted_state() {
        let host = Arc::new(StaticPage::new(PageSnapshot::default()));
        let ctx = AgentContext::new(
            ConfigStore::new(),
            Arc::clone(&host) as Arc<dyn HostPage>,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingTransport::new()),
        );

        assert!(!ctx.is_opted_out());
        host.set_force_opt_out(true);
        assert!(ctx.is_opted_out());
    }
}
