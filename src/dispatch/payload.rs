// src/dispatch/payload.rs
//! Outbound analytics event model

use crate::host::PageSnapshot;
use serde::{Deserialize, Serialize};

/// Event types accepted by the collection endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Navigation to a new logical path
    Pageview,

    /// Caller-named event with an arbitrary property bag
    CustomEvent,

    /// Performance sample; exempt from skip/mask filtering
    Performance,

    /// Captured page error
    PageError,

    /// Click on a link leaving the site
    OutboundLink,
}

impl EventType {
    /// Whether the type carries (and therefore requires) an event name
    pub fn requires_name(&self) -> bool {
        matches!(
            self,
            EventType::CustomEvent | EventType::Performance | EventType::PageError
        )
    }
}

/// Per-call options for [`Dispatcher::track`](crate::dispatch::Dispatcher::track)
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    /// Event name, required for types that carry one
    pub event_name: Option<String>,

    /// Arbitrary property bag, serialized only when non-empty
    pub properties: Option<serde_json::Value>,

    /// Pageview path override: must start with `/` or be an absolute URL
    pub path_override: Option<String>,
}

/// One outbound analytics event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub site_id: String,
    pub hostname: String,
    pub pathname: String,
    pub querystring: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub locale: String,
    pub title: String,
    pub referrer: String,
    pub event_type: EventType,
    pub timestamp: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,

    /// JSON-serialized property bag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TrackPayload {
    /// Base payload from a page snapshot; type-conditional fields start empty
    pub fn from_snapshot(
        site_id: &str,
        snapshot: &PageSnapshot,
        event_type: EventType,
    ) -> Self {
        Self {
            site_id: site_id.to_string(),
            hostname: snapshot.hostname.clone(),
            pathname: snapshot.pathname.clone(),
            querystring: snapshot.querystring.clone(),
            screen_width: snapshot.viewport_width,
            screen_height: snapshot.viewport_height,
            locale: snapshot.locale.clone(),
            title: snapshot.title.clone(),
            referrer: snapshot.referrer.clone(),
            event_type,
            timestamp: chrono::Utc::now().timestamp_millis(),
            event_name: None,
            properties: None,
            user_id: None,
        }
    }
}

/// Serialize a property bag, or `None` when it carries nothing
pub(crate) fn serialize_properties(properties: Option<&serde_json::Value>) -> Option<String> {
    let value = properties?;
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Object(map) if map.is_empty() => None,
        _ => serde_json::to_string(value).ok(),
    }
}
