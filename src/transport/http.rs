// src/transport/http.rs
//! Beacon-first HTTP delivery
//!
//! Prefers the host beacon hook when one is installed; otherwise (or when
//! the beacon rejects the payload) issues a keep-alive POST and treats any
//! non-2xx status as a delivery failure.

use crate::transport::{BeaconSender, DeliveryRequest, Transport};
use crate::utils::errors::{AgentError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_ENCODING, CONTENT_TYPE};
use hyper::Method;
use std::sync::Arc;
use tracing::{debug, warn};

type HttpClient = hyper_util::client::legacy::Client<
    hyper_util::client::legacy::connect::HttpConnector,
    Full<Bytes>,
>;

/// Default transport: beacon when available, POST fallback
pub struct HttpTransport {
    client: HttpClient,
    beacon: Option<Arc<dyn BeaconSender>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = hyper_util::client::legacy::Client::builder(
            hyper_util::rt::TokioExecutor::new(),
        )
        .build_http();

        Self {
            client,
            beacon: None,
        }
    }

    /// Install a host beacon hook tried before the POST fallback
    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconSender>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    async fn post(&self, request: &DeliveryRequest) -> Result<()> {
        let mut builder = hyper::Request::builder()
            .method(Method::POST)
            .uri(request.url.as_str())
            .header(CONTENT_TYPE, request.content_type);

        if let Some(encoding) = request.content_encoding {
            builder = builder.header(CONTENT_ENCODING, encoding);
        }

        let req = builder
            .body(Full::new(Bytes::from(request.body.clone())))
            .map_err(|e| AgentError::DeliveryFailed(format!("Request build error: {}", e)))?;

        let response = self
            .client
            .request(req)
            .await
            .map_err(|e| AgentError::DeliveryFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::DeliveryFailed(format!("status {}", status)));
        }

        debug!("Delivered {} bytes to {}", request.body.len(), request.url);
        Ok(())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: DeliveryRequest) -> Result<()> {
        if let Some(beacon) = &self.beacon {
            if beacon.send_beacon(&request.url, &request.body) {
                debug!("Beacon accepted {} bytes for {}", request.body.len(), request.url);
                return Ok(());
            }
            warn!("Beacon rejected payload, falling back to POST");
        }

        self.post(&request).await
    }
}
