// src/agent.rs
//! Agent facade
//!
//! One constructed object wires the whole pipeline: configuration store,
//! dispatcher, listener registry, and replay engine, all sharing a single
//! [`AgentContext`]. Initialization happens at most once per agent; there
//! is no global state to reach for.

use crate::config::{AgentOptions, ConfigRead, ConfigStore};
use crate::context::AgentContext;
use crate::dispatch::{Dispatcher, EventType, TrackOptions};
use crate::host::{HostPage, MemoryStore, PersistedStore};
use crate::listeners::{ListenerRegistry, NavigationHub, NavigationObserver};
use crate::replay::{DomRecorder, ReplayEngine, ReplayStats};
use crate::transport::{BeaconSender, HttpTransport, Transport};
use crate::utils::errors::Result;
use std::sync::Arc;
use tracing::info;

/// Builder for a [`TelemetryAgent`]
///
/// Only the options and the host page are required; everything else has a
/// working default: in-memory persistence, HTTP transport, an owned
/// navigation hub, and no recorder (replay then refuses to start).
pub struct AgentBuilder {
    options: AgentOptions,
    host: Arc<dyn HostPage>,
    store: Arc<dyn PersistedStore>,
    transport: Option<Arc<dyn Transport>>,
    observer: Option<Arc<dyn NavigationObserver>>,
    recorder: Option<Arc<dyn DomRecorder>>,
    beacon: Option<Arc<dyn BeaconSender>>,
}

impl AgentBuilder {
    pub fn new(options: AgentOptions, host: Arc<dyn HostPage>) -> Self {
        Self {
            options,
            host,
            store: Arc::new(MemoryStore::new()),
            transport: None,
            observer: None,
            recorder: None,
            beacon: None,
        }
    }

    /// Use a persisted store instead of the in-memory default
    pub fn with_store(mut self, store: Arc<dyn PersistedStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the delivery transport entirely
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Subscribe to a host-provided navigation observer
    pub fn with_observer(mut self, observer: Arc<dyn NavigationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Install the external DOM recorder enabling replay capture
    pub fn with_recorder(mut self, recorder: Arc<dyn DomRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Install a host beacon hook on the default HTTP transport
    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconSender>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Initialize configuration and assemble the agent
    ///
    /// Fails when the options are invalid or the configuration was somehow
    /// initialized already; nothing is installed or recorded yet on
    /// success — call [`TelemetryAgent::install_listeners`] and
    /// [`TelemetryAgent::start_replay`] as needed.
    pub async fn initialize(self) -> Result<TelemetryAgent> {
        let config = ConfigStore::new();
        config.initialize(self.options).await?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let mut http = HttpTransport::new();
                if let Some(beacon) = self.beacon {
                    http = http.with_beacon(beacon);
                }
                Arc::new(http)
            }
        };

        let navigation = Arc::new(NavigationHub::new());
        let observer: Arc<dyn NavigationObserver> = match self.observer {
            Some(observer) => observer,
            None => Arc::clone(&navigation) as _,
        };

        let ctx = Arc::new(AgentContext::new(config, self.host, self.store, transport));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ctx)));
        let listeners =
            ListenerRegistry::new(Arc::clone(&ctx), Arc::clone(&dispatcher), observer);
        let replay = ReplayEngine::new(Arc::clone(&ctx), self.recorder);

        info!("Telemetry agent ready");

        Ok(TelemetryAgent {
            ctx,
            dispatcher,
            listeners,
            replay,
            navigation,
        })
    }
}

/// The assembled telemetry agent
pub struct TelemetryAgent {
    ctx: Arc<AgentContext>,
    dispatcher: Arc<Dispatcher>,
    listeners: ListenerRegistry,
    replay: ReplayEngine,
    navigation: Arc<NavigationHub>,
}

impl TelemetryAgent {
    pub fn builder(options: AgentOptions, host: Arc<dyn HostPage>) -> AgentBuilder {
        AgentBuilder::new(options, host)
    }

    /// Build and deliver one event, best-effort
    pub fn track(&self, event_type: EventType, opts: TrackOptions) {
        self.dispatcher.track(event_type, opts);
    }

    /// Track a pageview of the current page
    pub fn pageview(&self) {
        self.track(EventType::Pageview, TrackOptions::default());
    }

    /// Track a named custom event with an optional property bag
    pub fn custom(&self, name: impl Into<String>, properties: Option<serde_json::Value>) {
        self.track(
            EventType::CustomEvent,
            TrackOptions {
                event_name: Some(name.into()),
                properties,
                ..Default::default()
            },
        );
    }

    /// The hub hosts push navigation events into (when no custom observer
    /// was supplied)
    pub fn navigation(&self) -> &Arc<NavigationHub> {
        &self.navigation
    }

    /// Register a synchronous page-change callback
    pub fn on_page_change<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.dispatcher.on_page_change(callback);
    }

    pub fn install_listeners(&self) {
        self.listeners.install();
    }

    pub fn uninstall_listeners(&self) {
        self.listeners.uninstall();
    }

    pub async fn start_replay(&self) -> Result<()> {
        self.replay.start().await
    }

    pub async fn stop_replay(&self) {
        self.replay.stop().await;
    }

    pub fn replay_stats(&self) -> ReplayStats {
        self.replay.stats()
    }

    pub fn identify(&self, user_id: &str) -> Result<()> {
        self.ctx.identify(user_id)
    }

    pub fn clear_identity(&self) -> Result<()> {
        self.ctx.clear_identity()
    }

    pub fn opt_out(&self) -> Result<()> {
        self.ctx.opt_out()
    }

    pub fn opt_in(&self) -> Result<()> {
        self.ctx.opt_in()
    }

    pub fn is_opted_out(&self) -> bool {
        self.ctx.is_opted_out()
    }

    /// Read the frozen configuration
    pub fn config(&self) -> ConfigRead {
        self.ctx.config.read()
    }

    /// Tear everything down: listeners out, replay stopped with its final
    /// flush
    pub async fn shutdown(&self) {
        self.listeners.uninstall();
        self.replay.stop().await;
        info!("Telemetry agent shut down");
    }
}
