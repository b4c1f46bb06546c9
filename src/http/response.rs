//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay the winning endpoint response unchanged
//! - Tag relayed responses with failover indices
//! - Map proxy-side failures to status codes with text/plain bodies
//!
//! # Design Decisions
//! - Relayed bodies stream through without buffering
//! - Exhaustion is always 500, whatever the endpoints returned

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::failover::{AggregatedFailure, Dispatched};
use crate::multipart::MultipartError;

/// Cursor value the dispatch started probing at.
pub const X_FAILOVER_START_INDEX: &str = "x-failover-start-index";

/// Index of the endpoint whose response is relayed.
pub const X_FAILOVER_ENDPOINT_INDEX: &str = "x-failover-endpoint-index";

/// Caller-visible failures of the proxy itself.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("No failover group matches the request")]
    NoRoute,

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Malformed multipart body: {0}")]
    MalformedMultipart(#[source] MultipartError),

    #[error(transparent)]
    Exhausted(#[from] AggregatedFailure),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoRoute => StatusCode::NOT_FOUND,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BodyRead(_) | ProxyError::MalformedMultipart(_) => StatusCode::BAD_REQUEST,
            ProxyError::Exhausted(failure) => failure.status(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Turn a successful dispatch into the client response.
pub fn relay(dispatched: Dispatched) -> Response {
    let (mut parts, body) = dispatched.response.into_parts();
    parts
        .headers
        .insert(X_FAILOVER_START_INDEX, HeaderValue::from(dispatched.start_index));
    parts
        .headers
        .insert(X_FAILOVER_ENDPOINT_INDEX, HeaderValue::from(dispatched.endpoint_index));
    Response::from_parts(parts, body)
}
