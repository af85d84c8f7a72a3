// src/listeners/registry.rs
//! Listener lifecycle
//!
//! uninstalled → installed → uninstalled. Install captures the current
//! path, fires one deferred initial pageview, and subscribes to the host
//! navigation observer so every client-side navigation funnels through the
//! same debounced pageview trigger. Uninstall tears everything down and
//! must leave the registry reinstallable.

use crate::context::AgentContext;
use crate::dispatch::{Dispatcher, EventType, TrackOptions};
use crate::listeners::debounce::Debouncer;
use crate::listeners::navigation::NavigationObserver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Installs and removes the page-level observers
pub struct ListenerRegistry {
    ctx: Arc<AgentContext>,
    dispatcher: Arc<Dispatcher>,
    observer: Arc<dyn NavigationObserver>,
    installed: AtomicBool,
    subscription: Mutex<Option<JoinHandle<()>>>,
    debouncer: Mutex<Option<Arc<Debouncer>>>,
}

impl ListenerRegistry {
    pub fn new(
        ctx: Arc<AgentContext>,
        dispatcher: Arc<Dispatcher>,
        observer: Arc<dyn NavigationObserver>,
    ) -> Self {
        Self {
            ctx,
            dispatcher,
            observer,
            installed: AtomicBool::new(false),
            subscription: Mutex::new(None),
            debouncer: Mutex::new(None),
        }
    }

    /// Install page observers; a second install is logged, not re-applied
    pub fn install(&self) {
        if self.installed.swap(true, Ordering::SeqCst) {
            debug!("Listeners already installed; ignoring");
            return;
        }

        let read = self.ctx.config.read();
        if !read.is_configured() {
            warn!("Installing listeners before initialization; using defaults");
        }
        let config = Arc::clone(read.config());

        // Seed the last-observed path so the initial pageview does not fire
        // the page-change callbacks.
        let snapshot = self.ctx.host.snapshot();
        self.dispatcher.prime_last_path(&snapshot.pathname);

        if config.track_pageviews {
            // Deferred one event-loop turn so the page has settled.
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                dispatcher.track(EventType::Pageview, TrackOptions::default());
            });
        }

        if config.track_spa_routes {
            let debouncer = Arc::new(Debouncer::new(config.debounce));
            *self.debouncer.lock() = Some(Arc::clone(&debouncer));

            let dispatcher = Arc::clone(&self.dispatcher);
            let mut receiver = self.observer.subscribe();
            let handle = tokio::spawn(async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => {
                            debug!(kind = ?event.kind, "Navigation observed");
                            let dispatcher = Arc::clone(&dispatcher);
                            debouncer.call(move || {
                                dispatcher.track(EventType::Pageview, TrackOptions::default());
                            });
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Navigation subscriber lagged, skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });
            *self.subscription.lock() = Some(handle);
        }

        info!("Listeners installed");
    }

    /// Remove everything `install` set up; safe to call repeatedly
    pub fn uninstall(&self) {
        if !self.installed.swap(false, Ordering::SeqCst) {
            debug!("Listeners not installed; ignoring");
            return;
        }

        if let Some(handle) = self.subscription.lock().take() {
            handle.abort();
        }
        if let Some(debouncer) = self.debouncer.lock().take() {
            debouncer.cancel();
        }
        self.dispatcher.clear_page_change_callbacks();

        info!("Listeners uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentOptions, ConfigStore};
    use crate::host::{MemoryStore, PageSnapshot, StaticPage};
    use crate::listeners::navigation::{NavigationEvent, NavigationHub, NavigationKind};
    use crate::transport::testing::{wait_for, RecordingTransport};

    struct Fixture {
        host: Arc<StaticPage>,
        hub: Arc<NavigationHub>,
        transport: Arc<RecordingTransport>,
        registry: ListenerRegistry,
    }

    async fn fixture(mutate: impl FnOnce(&mut AgentOptions)) -> Fixture {
        let config = ConfigStore::new();
        let mut options = AgentOptions::new("https://collect.example.com", "site_1");
        mutate(&mut options);
        config.initialize(options).await.unwrap();

        let host = Arc::new(StaticPage::new(PageSnapshot {
            hostname: "example.com".to_string(),
            pathname: "/start".to_string(),
            ..Default::default()
        }));
        let transport = Arc::new(RecordingTransport::new());
        let ctx = Arc::new(AgentContext::new(
            config,
            Arc::clone(&host) as _,
            Arc::new(MemoryStore::new()),
            Arc::clone(&transport) as _,
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
        let hub = Arc::new(NavigationHub::new());
        let registry = ListenerRegistry::new(ctx, dispatcher, Arc::clone(&hub) as _);

        Fixture {
            host,
            hub,
            transport,
            registry,
        }
    }

    #[tokio::test]
    async fn test_install_fires_initial_pageview() {
        let f = fixture(|_| {}).await;
        f.registry.install();
        assert!(f.registry.is_installed());

        wait_for(|| f.transport.sent_count() == 1).await;
        assert_eq!(f.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_navigation_events_produce_pageviews() {
        let f = fixture(|_| {}).await;
        f.registry.install();
        wait_for(|| f.transport.sent_count() == 1).await;

        f.host.set_location("/next", "");
        f.hub.notify(NavigationEvent::new(NavigationKind::Push));
        wait_for(|| f.transport.sent_count() == 2).await;
        assert_eq!(f.transport.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_double_install_is_not_reapplied() {
        let f = fixture(|_| {}).await;
        f.registry.install();
        f.registry.install();

        wait_for(|| f.transport.sent_count() == 1).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        // A second install must not produce a second initial pageview.
        assert_eq!(f.transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_uninstall_stops_navigation_tracking() {
        let f = fixture(|_| {}).await;
        f.registry.install();
        wait_for(|| f.transport.sent_count() == 1).await;

        f.registry.uninstall();
        assert!(!f.registry.is_installed());

        f.hub.notify(NavigationEvent::new(NavigationKind::Push));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(f.transport.sent_count(), 1);

        // Reinstall works after uninstall.
        f.registry.install();
        assert!(f.registry.is_installed());
    }

    #[tokio::test]
    async fn test_disabled_pageviews_suppress_initial_event() {
        let f = fixture(|o| o.track_pageviews = Some(false)).await;
        f.registry.install();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(f.transport.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_debounced_navigations_collapse() {
        let f = fixture(|o| o.debounce_ms = 50).await;
        f.registry.install();
        wait_for(|| f.transport.sent_count() == 1).await;

        for _ in 0..5 {
            f.hub.notify(NavigationEvent::new(NavigationKind::Push));
        }

        // All five triggers land within the quiet period; one trailing
        // pageview results.
        wait_for(|| f.transport.sent_count() == 2).await;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(f.transport.sent_count(), 2);
    }
}
