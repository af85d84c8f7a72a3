// src/dispatch/dispatcher.rs
//! Event dispatcher
//!
//! `track` turns the current page state and a requested event type into at
//! most one outbound delivery attempt. Short-circuits apply in a fixed
//! order: opt-out first (an opted-out user produces zero observable work),
//! then configuration validity, then event-name validation.
//!
//! Path classification tests the skip list before the mask list; a mask
//! match replaces the path with the literal pattern text and clears the
//! query string so the real location never leaks. Performance events are
//! exempt from both lists.

use crate::context::AgentContext;
use crate::dispatch::pattern::first_match;
use crate::dispatch::payload::{serialize_properties, EventType, TrackOptions, TrackPayload};
use crate::transport::DeliveryRequest;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Path component of the analytics delivery endpoint
pub const TRACK_PATH: &str = "track";

/// Callback invoked with (new, previous) path on every pathname change
pub type PageChangeCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Builds, classifies, and delivers analytics events
pub struct Dispatcher {
    ctx: Arc<AgentContext>,
    last_path: Mutex<Option<String>>,
    callbacks: Mutex<Vec<PageChangeCallback>>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self {
            ctx,
            last_path: Mutex::new(None),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a page-change callback; insertion order is invocation order
    pub fn on_page_change<F>(&self, callback: F)
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Arc::new(callback));
    }

    /// Drop every registered page-change callback
    pub fn clear_page_change_callbacks(&self) {
        self.callbacks.lock().clear();
    }

    /// Seed the last-observed path without firing callbacks
    pub fn prime_last_path(&self, path: &str) {
        *self.last_path.lock() = Some(path.to_string());
    }

    /// Build and deliver one event; at most one outbound attempt
    pub fn track(&self, event_type: EventType, opts: TrackOptions) {
        if self.ctx.is_opted_out() {
            return;
        }

        let read = self.ctx.config.read();
        if !read.is_configured() {
            warn!("track called before initialization; event dropped");
            return;
        }
        let config = Arc::clone(read.config());

        let event_name = opts.event_name.as_deref().unwrap_or("").trim().to_string();
        if event_type.requires_name() && event_name.is_empty() {
            warn!(?event_type, "Event requires a name; event dropped");
            return;
        }

        let snapshot = self.ctx.host.snapshot();

        // Path resolution: a pageview override carries its own path and
        // query, independent of the live page location.
        let override_location = match (event_type, opts.path_override.as_deref()) {
            (EventType::Pageview, Some(raw)) => {
                let resolved = resolve_override(raw);
                if resolved.is_none() {
                    warn!("Invalid path override {:?}; using page location", raw);
                }
                resolved
            }
            _ => None,
        };

        let (mut pathname, mut querystring) = match override_location {
            Some(location) => location,
            None => {
                let query = if config.capture_querystring {
                    snapshot.querystring.clone()
                } else {
                    String::new()
                };
                (snapshot.pathname.clone(), query)
            }
        };

        // Callbacks observe every resolved-path change, including paths the
        // classification below will skip or mask.
        self.notify_page_change(&pathname);

        if event_type != EventType::Performance {
            if let Some(pattern) = first_match(&pathname, &config.skip_patterns) {
                debug!("Path {} matched skip pattern {}; event dropped", pathname, pattern.raw());
                return;
            }

            if let Some(pattern) = first_match(&pathname, &config.mask_patterns) {
                pathname = pattern.raw().to_string();
                querystring = String::new();
            }
        }

        let mut payload = TrackPayload::from_snapshot(&config.site_id, &snapshot, event_type);
        payload.pathname = pathname;
        payload.querystring = querystring;
        if event_type.requires_name() {
            payload.event_name = Some(event_name);
        }
        payload.properties = serialize_properties(opts.properties.as_ref());
        payload.user_id = self.ctx.user_id();

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!("Payload serialization failed: {}", e);
                return;
            }
        };

        let request = DeliveryRequest::json(
            format!("{}/{}", config.endpoint, TRACK_PATH),
            body,
        );

        // Fire and forget: failures are logged and never retried.
        let transport = Arc::clone(&self.ctx.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.send(request).await {
                warn!("Event delivery failed: {}", e);
            }
        });
    }

    /// Invoke registered callbacks when the resolved pathname changed
    fn notify_page_change(&self, pathname: &str) {
        let previous = {
            let mut last = self.last_path.lock();
            match last.as_deref() {
                Some(p) if p == pathname => return,
                _ => last.replace(pathname.to_string()).unwrap_or_default(),
            }
        };

        let callbacks: Vec<PageChangeCallback> = self.callbacks.lock().clone();
        for callback in callbacks {
            // One panicking subscriber must not break the others or the
            // dispatch path.
            if catch_unwind(AssertUnwindSafe(|| callback(pathname, &previous))).is_err() {
                warn!("Page-change callback panicked");
            }
        }
    }
}

/// Extract (pathname, querystring) from a path override
///
/// The override is resolved against a neutral base so its own components
/// come out independent of the live page location.
fn resolve_override(raw: &str) -> Option<(String, String)> {
    let url = if raw.starts_with('/') {
        Url::parse("http://neutral.invalid").ok()?.join(raw).ok()?
    } else {
        let parsed = Url::parse(raw).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        parsed
    };

    let querystring = url
        .query()
        .map(|q| format!("?{}", q))
        .unwrap_or_default();
    Some((url.path().to_string(), querystring))
}
