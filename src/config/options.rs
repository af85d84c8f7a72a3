// src/config/options.rs
//! Caller options, remote toggles, and the resolved configuration
//!
//! Three layers feed the frozen configuration, at precedence
//! explicit caller option > remote value > built-in default. Caller fields
//! for remotely-controlled toggles are `Option<bool>` so "not set by the
//! caller" is distinguishable from an explicit choice.

use crate::dispatch::pattern::PathPattern;
use serde::Deserialize;
use std::time::Duration;

/// Built-in defaults for the remote-controlled toggles
pub const DEFAULT_TRACK_PAGEVIEWS: bool = true;
pub const DEFAULT_TRACK_SPA_ROUTES: bool = true;
pub const DEFAULT_CAPTURE_QUERYSTRING: bool = true;
pub const DEFAULT_TRACK_OUTBOUND_LINKS: bool = true;
pub const DEFAULT_TRACK_WEB_VITALS: bool = false;
pub const DEFAULT_TRACK_ERRORS: bool = false;
pub const DEFAULT_ENABLE_REPLAY: bool = false;

/// Documented minimums for clamped numeric options
pub const MIN_REPLAY_FLUSH_INTERVAL_MS: u64 = 1_000;
pub const MIN_REPLAY_FLUSH_THRESHOLD: usize = 16;

/// Caller-supplied initialization options
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Collection endpoint base URL (required)
    pub endpoint: String,

    /// Site identifier (required)
    pub site_id: String,

    /// Navigation debounce duration in milliseconds; negative clamps to zero
    pub debounce_ms: i64,

    /// Path patterns whose match suppresses tracking entirely
    pub skip_patterns: Vec<String>,

    /// Path patterns whose match replaces the path with the pattern text
    pub mask_patterns: Vec<String>,

    /// Verbose agent logging
    pub debug: bool,

    /// Fetch remotely-controlled toggles during initialization
    pub use_remote_config: bool,

    /// Time bound on the remote-config fetch
    pub remote_config_timeout_ms: u64,

    /// Remote-controlled toggles; `None` defers to remote then default
    pub track_pageviews: Option<bool>,
    pub track_spa_routes: Option<bool>,
    pub capture_querystring: Option<bool>,
    pub track_outbound_links: Option<bool>,
    pub track_web_vitals: Option<bool>,
    pub track_errors: Option<bool>,
    pub enable_replay: Option<bool>,

    /// Replay capture options (locally controlled)
    pub replay: ReplayOptions,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            site_id: String::new(),
            debounce_ms: 0,
            skip_patterns: vec![],
            mask_patterns: vec![],
            debug: false,
            use_remote_config: false,
            remote_config_timeout_ms: 2_000,
            track_pageviews: None,
            track_spa_routes: None,
            capture_querystring: None,
            track_outbound_links: None,
            track_web_vitals: None,
            track_errors: None,
            enable_replay: None,
            replay: ReplayOptions::default(),
        }
    }
}

impl AgentOptions {
    pub fn new(endpoint: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            site_id: site_id.into(),
            ..Default::default()
        }
    }
}

/// Locally-controlled replay capture options
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Fraction of sessions to record, clamped to 0.0..=1.0
    pub sample_rate: f64,

    /// Mask the value of every input field
    pub mask_all_inputs: bool,

    /// Mask all visible text content
    pub mask_all_text: bool,

    /// Flush interval in milliseconds, clamped to a documented minimum
    pub flush_interval_ms: u64,

    /// Buffered-frame count that triggers an immediate flush
    pub flush_threshold: usize,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            mask_all_inputs: true,
            mask_all_text: false,
            flush_interval_ms: 5_000,
            flush_threshold: 200,
        }
    }
}

/// Remote configuration document, all fields optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteToggles {
    pub track_pageviews: Option<bool>,
    pub track_spa_routes: Option<bool>,
    pub capture_querystring: Option<bool>,
    pub track_outbound_links: Option<bool>,
    pub track_web_vitals: Option<bool>,
    pub track_errors: Option<bool>,
    pub enable_replay: Option<bool>,
}

/// Replay configuration after clamping and toggle resolution
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub enabled: bool,
    pub sample_rate: f64,
    pub mask_all_inputs: bool,
    pub mask_all_text: bool,
    pub flush_interval: Duration,
    pub flush_threshold: usize,
}

/// The frozen configuration every component reads
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: String,
    pub site_id: String,
    pub debounce: Duration,
    pub skip_patterns: Vec<PathPattern>,
    pub mask_patterns: Vec<PathPattern>,
    pub debug: bool,
    pub track_pageviews: bool,
    pub track_spa_routes: bool,
    pub capture_querystring: bool,
    pub track_outbound_links: bool,
    pub track_web_vitals: bool,
    pub track_errors: bool,
    pub replay: ReplayConfig,
}

impl ResolvedConfig {
    /// Built-in defaults, returned for reads before initialization
    pub fn defaults() -> Self {
        Self::resolve(&AgentOptions::default(), None)
    }

    /// Merge caller options and remote toggles over the built-in defaults
    pub fn resolve(options: &AgentOptions, remote: Option<&RemoteToggles>) -> Self {
        fn pick(local: Option<bool>, remote: Option<bool>, default: bool) -> bool {
            local.or(remote).unwrap_or(default)
        }

        let empty = RemoteToggles::default();
        let remote = remote.unwrap_or(&empty);

        // A non-finite rate would poison the sampling draw; record everything
        // instead.
        let sample_rate = if options.replay.sample_rate.is_finite() {
            options.replay.sample_rate.clamp(0.0, 1.0)
        } else {
            1.0
        };

        let replay = ReplayConfig {
            enabled: pick(options.enable_replay, remote.enable_replay, DEFAULT_ENABLE_REPLAY),
            sample_rate,
            mask_all_inputs: options.replay.mask_all_inputs,
            mask_all_text: options.replay.mask_all_text,
            flush_interval: Duration::from_millis(
                options
                    .replay
                    .flush_interval_ms
                    .max(MIN_REPLAY_FLUSH_INTERVAL_MS),
            ),
            flush_threshold: options.replay.flush_threshold.max(MIN_REPLAY_FLUSH_THRESHOLD),
        };

        Self {
            endpoint: options.endpoint.trim().trim_end_matches('/').to_string(),
            site_id: options.site_id.trim().to_string(),
            debounce: Duration::from_millis(options.debounce_ms.max(0) as u64),
            skip_patterns: PathPattern::compile_all(&options.skip_patterns),
            mask_patterns: PathPattern::compile_all(&options.mask_patterns),
            debug: options.debug,
            track_pageviews: pick(
                options.track_pageviews,
                remote.track_pageviews,
                DEFAULT_TRACK_PAGEVIEWS,
            ),
            track_spa_routes: pick(
                options.track_spa_routes,
                remote.track_spa_routes,
                DEFAULT_TRACK_SPA_ROUTES,
            ),
            capture_querystring: pick(
                options.capture_querystring,
                remote.capture_querystring,
                DEFAULT_CAPTURE_QUERYSTRING,
            ),
            track_outbound_links: pick(
                options.track_outbound_links,
                remote.track_outbound_links,
                DEFAULT_TRACK_OUTBOUND_LINKS,
            ),
            track_web_vitals: pick(
                options.track_web_vitals,
                remote.track_web_vitals,
                DEFAULT_TRACK_WEB_VITALS,
            ),
            track_errors: pick(options.track_errors, remote.track_errors, DEFAULT_TRACK_ERRORS),
            replay,
        }
    }
}
