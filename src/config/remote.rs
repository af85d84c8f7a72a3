// src/config/remote.rs
//! Remote configuration fetch
//!
//! One time-bounded GET per initialization. Any failure mode — network
//! error, non-2xx status, malformed body, timeout — yields `None` and the
//! remote-controlled fields fall back to their defaults.

use crate::config::options::RemoteToggles;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Method;
use std::time::Duration;
use tracing::{debug, warn};

/// Path component of the remote-config endpoint
pub const CONFIG_PATH: &str = "config";

/// Fetch the remote toggles for a site; `None` means "no remote config"
pub(crate) async fn fetch_remote_toggles(
    endpoint: &str,
    site_id: &str,
    timeout: Duration,
) -> Option<RemoteToggles> {
    let url = format!("{}/{}/{}", endpoint, CONFIG_PATH, site_id);
    debug!("Fetching remote config from {}", url);

    match tokio::time::timeout(timeout, fetch(&url)).await {
        Ok(Some(toggles)) => Some(toggles),
        Ok(None) => None,
        Err(_) => {
            warn!("Remote config fetch timed out after {:?}", timeout);
            None
        }
    }
}

async fn fetch(url: &str) -> Option<RemoteToggles> {
    let client = hyper_util::client::legacy::Client::builder(
        hyper_util::rt::TokioExecutor::new(),
    )
    .build_http::<Full<Bytes>>();

    let request = hyper::Request::builder()
        .method(Method::GET)
        .uri(url)
        .body(Full::new(Bytes::new()))
        .ok()?;

    let response = match client.request(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Remote config fetch failed: {}", e);
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        warn!("Remote config fetch returned status {}", status);
        return None;
    }

    let body = match response.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Remote config body read failed: {}", e);
            return None;
        }
    };

    match serde_json::from_slice::<RemoteToggles>(&body) {
        Ok(toggles) => {
            debug!("Remote config applied: {:?}", toggles);
            Some(toggles)
        }
        Err(e) => {
            warn!("Remote config body was not valid JSON: {}", e);
            None
        }
    }
}
