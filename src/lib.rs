// src/lib.rs
//! Pagepulse Telemetry Agent Library
//!
//! An embeddable telemetry agent: it observes navigation and interaction
//! events surfaced by a host environment, classifies and rewrites their
//! paths, and delivers structured analytics events best-effort, with an
//! optional compressed session-replay stream on the side.
//!
//! # Architecture
//!
//! The agent is structured into several key modules:
//!
//! - **config**: defaults + remote config + caller options, frozen once
//! - **dispatch**: path patterns, event payloads, the `track` pipeline
//! - **transport**: beacon-first, POST-fallback delivery seam
//! - **listeners**: navigation subscription, debounce, install lifecycle
//! - **replay**: frame buffering, batch flush, and the retry guarantee
//! - **host**: page snapshots, opt-out signal, persisted storage
//! - **observability**: optional tracing bootstrap for the host
//!
//! Delivery is at-most-once by design; only the replay buffer retries, and
//! only by re-queueing frames whose batch failed to send.

// Public module exports
pub mod agent;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod host;
pub mod listeners;
pub mod observability;
pub mod replay;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use agent::{AgentBuilder, TelemetryAgent};
pub use config::{AgentOptions, ConfigRead, ConfigStore, ReplayOptions};
pub use context::AgentContext;
pub use dispatch::{EventType, PathPattern, TrackOptions, TrackPayload};
pub use host::{HostPage, MemoryStore, PageSnapshot, PersistedStore, SqliteStore, StaticPage};
pub use listeners::{NavigationEvent, NavigationHub, NavigationKind, NavigationObserver};
pub use replay::{DomRecorder, RecorderHandle, RecorderPolicy, ReplayFrame, ReplayStats};
pub use transport::{BeaconSender, DeliveryRequest, HttpTransport, Transport};
pub use utils::errors::{AgentError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
