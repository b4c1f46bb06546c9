//! Replay-safe request representation.
//!
//! The inbound body is read once. Raw bodies are re-sent as the same
//! `Bytes`; multipart bodies are kept as their materialized part list and
//! re-framed for every attempt.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, Method};

use crate::multipart::{self, BodyPart, MultipartError};

/// Request headers that never travel to an upstream as-is.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Buffered body of an envelope.
#[derive(Debug, Clone)]
pub enum EnvelopeBody {
    Raw(Bytes),
    Multipart { boundary: String, parts: Vec<BodyPart> },
}

/// A fully buffered inbound request, re-sendable to any number of endpoints.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    method: Method,
    path_and_query: String,
    headers: HeaderMap,
    body: EnvelopeBody,
}

impl RequestEnvelope {
    /// Build an envelope, materializing the body when it is multipart.
    ///
    /// Hop-by-hop headers (plus any named in `Connection`), `Host` and
    /// `Content-Length` are dropped; the transport derives them per attempt.
    pub fn new(
        method: Method,
        path_and_query: impl Into<String>,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Self, MultipartError> {
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());

        let body = match content_type {
            Some(ct) if multipart::is_multipart(ct) => EnvelopeBody::Multipart {
                boundary: multipart::boundary_from_content_type(ct)?,
                parts: multipart::materialize(&body, ct)?,
            },
            _ => EnvelopeBody::Raw(body),
        };

        Ok(Self {
            method,
            path_and_query: path_and_query.into(),
            headers: forwardable_headers(headers),
            body,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path below the group prefix, plus query.
    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &EnvelopeBody {
        &self.body
    }

    /// Materialized parts, if the body is multipart.
    pub fn parts(&self) -> Option<&[BodyPart]> {
        match &self.body {
            EnvelopeBody::Multipart { parts, .. } => Some(parts),
            EnvelopeBody::Raw(_) => None,
        }
    }

    /// Body bytes for one attempt.
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            EnvelopeBody::Raw(bytes) => bytes.clone(),
            EnvelopeBody::Multipart { boundary, parts } => multipart::serialize(parts, boundary),
        }
    }
}

fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let connection_listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name)
            || connection_listed.contains(name)
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
        {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}
