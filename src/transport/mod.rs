// src/transport/mod.rs
//! Outbound delivery
//!
//! A single seam hides how payloads leave the agent:
//!
//! - **Transport**: object-safe async send of one serialized payload
//! - **BeaconSender**: optional host hook for page-unload-safe delivery
//! - **HttpTransport**: beacon first, keep-alive POST fallback
//!
//! Delivery is best-effort by design: at most one attempt per payload, no
//! ordering across events, and no retries here — the replay engine is the
//! only caller that reacts to a failure.

pub mod http;

// Re-export commonly used types
pub use http::HttpTransport;

use crate::utils::errors::Result;
use async_trait::async_trait;

/// One serialized payload on its way out
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Absolute destination URL
    pub url: String,

    /// Serialized body bytes
    pub body: Vec<u8>,

    /// Content type of the body
    pub content_type: &'static str,

    /// Optional content encoding (e.g. "zstd" for replay batches)
    pub content_encoding: Option<&'static str>,
}

impl DeliveryRequest {
    pub fn json(url: String, body: Vec<u8>) -> Self {
        Self {
            url,
            body,
            content_type: "application/json",
            content_encoding: None,
        }
    }
}

/// Object-safe delivery seam
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt delivery once; an error means this payload will not arrive
    async fn send(&self, request: DeliveryRequest) -> Result<()>;
}

/// Host hook for non-blocking, page-unload-safe delivery
///
/// A beacon has no response visibility: acceptance (`true`) counts as
/// success. Rejection falls back to the POST path.
pub trait BeaconSender: Send + Sync {
    fn send_beacon(&self, url: &str, body: &[u8]) -> bool;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared test doubles: an in-process HTTP collector and a recording
    //! transport.

    use super::{DeliveryRequest, Transport};
    use crate::utils::errors::{AgentError, Result};
    use async_trait::async_trait;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Minimal HTTP endpoint capturing every request body it receives
    pub(crate) struct TestCollector {
        pub addr: SocketAddr,
        hits: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl TestCollector {
        /// 200 on every request
        pub(crate) async fn start() -> Self {
            Self::spawn(0, String::new()).await
        }

        /// 500 on the first `fail_first` requests, 200 afterwards
        pub(crate) async fn start_failing(fail_first: usize) -> Self {
            Self::spawn(fail_first, String::new()).await
        }

        /// 200 with a fixed response body
        pub(crate) async fn start_with_body(body: &str) -> Self {
            Self::spawn(0, body.to_string()).await
        }

        async fn spawn(fail_first: usize, response_body: String) -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .unwrap();
            let addr = listener.local_addr().unwrap();

            let hits = Arc::new(AtomicUsize::new(0));
            let bodies = Arc::new(Mutex::new(Vec::new()));
            let remaining_failures = Arc::new(AtomicUsize::new(fail_first));

            let task_hits = Arc::clone(&hits);
            let task_bodies = Arc::clone(&bodies);
            tokio::spawn(async move {
                loop {
                    let (stream, _) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(_) => break,
                    };

                    let hits = Arc::clone(&task_hits);
                    let bodies = Arc::clone(&task_bodies);
                    let failures = Arc::clone(&remaining_failures);
                    let response_body = response_body.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req: Request<Incoming>| {
                            let hits = Arc::clone(&hits);
                            let bodies = Arc::clone(&bodies);
                            let failures = Arc::clone(&failures);
                            let response_body = response_body.clone();
                            async move {
                                let body = req
                                    .into_body()
                                    .collect()
                                    .await
                                    .map(|collected| collected.to_bytes().to_vec())
                                    .unwrap_or_default();

                                hits.fetch_add(1, Ordering::SeqCst);

                                let status = if failures
                                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                                        n.checked_sub(1)
                                    })
                                    .is_ok()
                                {
                                    StatusCode::INTERNAL_SERVER_ERROR
                                } else {
                                    bodies.lock().push(body);
                                    StatusCode::OK
                                };

                                Ok::<_, std::convert::Infallible>(
                                    Response::builder()
                                        .status(status)
                                        .body(Full::new(Bytes::from(response_body)))
                                        .unwrap(),
                                )
                            }
                        });

                        let _ = http1::Builder::new().serve_connection(io, service).await;
                    });
                }
            });

            Self { addr, hits, bodies }
        }

        pub(crate) fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        /// Bodies of the accepted (non-failed) requests, in arrival order
        pub(crate) fn bodies(&self) -> Vec<Vec<u8>> {
            self.bodies.lock().clone()
        }
    }

    /// Transport double that records requests instead of sending them
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<DeliveryRequest>>,
        pub fail_next: AtomicUsize,
    }

    impl RecordingTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Fail the next `n` sends with a delivery error
        pub(crate) fn fail_next(&self, n: usize) {
            self.fail_next.store(n, Ordering::SeqCst);
        }

        pub(crate) fn sent_count(&self) -> usize {
            self.sent.lock().len()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: DeliveryRequest) -> Result<()> {
            if self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(AgentError::DeliveryFailed("injected failure".to_string()));
            }
            self.sent.lock().push(request);
            Ok(())
        }
    }

    /// Wait until `predicate` holds or a short deadline passes
    pub(crate) async fn wait_for<F: Fn() -> bool>(predicate: F) {
        for _ in 0..200 {
            if predicate() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}
