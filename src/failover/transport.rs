//! Upstream transport.
//!
//! # Responsibilities
//! - Send one request envelope to one endpoint
//! - Enforce the per-attempt timeout up to the start of the response
//! - Report connection failures and timeouts as typed errors
//!
//! # Design Decisions
//! - `Transport` is the seam between failover logic and the HTTP client
//! - Response bodies are streamed back, never buffered here
//! - Connection pooling is the client's concern (hyper-util legacy client)

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::TimeoutConfig;
use crate::failover::endpoint::Endpoint;
use crate::failover::envelope::RequestEnvelope;

/// A failed attempt at the transport level.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No response headers arrived within the attempt timeout.
    #[error("Idle timeout triggered before initiating inbound response")]
    IdleTimeout { after: Duration },

    /// Connection refused, reset, or name resolution failed.
    #[error("Connection to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The upstream request could not be built.
    #[error("Invalid upstream request: {0}")]
    Request(String),

    /// Any other client failure after connecting.
    #[error("Upstream protocol error: {0}")]
    Protocol(String),
}

/// Sends a request to a single endpoint.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        request: &'a RequestEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>>;
}

/// Plain-HTTP transport over a pooled hyper client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    pub fn from_config(timeouts: &TimeoutConfig) -> Self {
        Self::new(Duration::from_millis(timeouts.connect_ms))
    }

    fn build_request(endpoint: &Endpoint, envelope: &RequestEnvelope) -> Result<Request<Body>, TransportError> {
        let uri = endpoint.target_uri(envelope.path_and_query())?;
        let mut request = Request::builder()
            .method(envelope.method().clone())
            .uri(uri)
            .body(Body::from(envelope.body_bytes()))
            .map_err(|e| TransportError::Request(e.to_string()))?;
        *request.headers_mut() = envelope.headers().clone();
        Ok(request)
    }
}

impl Transport for HyperTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        request: &'a RequestEnvelope,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
        Box::pin(async move {
            let upstream = Self::build_request(endpoint, request)?;

            match tokio::time::timeout(timeout, self.client.request(upstream)).await {
                Ok(Ok(response)) => Ok(response.map(Body::new)),
                Ok(Err(e)) => {
                    let reason = error_chain(&e);
                    if e.is_connect() {
                        Err(TransportError::Connect {
                            endpoint: endpoint.to_string(),
                            reason,
                        })
                    } else {
                        Err(TransportError::Protocol(reason))
                    }
                }
                Err(_) => Err(TransportError::IdleTimeout { after: timeout }),
            }
        })
    }
}

// hyper-util's top-level error text is generic; the cause is in the source chain.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        description.push_str(": ");
        description.push_str(&cause.to_string());
        source = cause.source();
    }
    description
}
