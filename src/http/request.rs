//! Request handling and transformation.
//!
//! # Responsibilities
//! - Assign and propagate the request ID
//! - Buffer the inbound body within the configured limit
//! - Turn the inbound request into a replayable RequestEnvelope
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Declared Content-Length is checked before reading the body

use axum::body::{Body, Bytes};
use axum::http::{header, request, HeaderMap};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::failover::RequestEnvelope;
use crate::http::response::ProxyError;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Assigns a UUID v4 request ID unless the client sent one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// The request ID, or `unknown` when the layer did not run.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Buffer the whole body, failing once it exceeds `limit` bytes.
pub async fn read_body(body: Body, headers: &HeaderMap, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(ProxyError::PayloadTooLarge { limit }),
        Err(e) => Err(ProxyError::BodyRead(e.to_string())),
    }
}

/// Build the envelope forwarded to every endpoint.
///
/// `remainder` is the path below the group's prefix; the inbound query is kept.
pub fn envelope_from_parts(parts: &request::Parts, remainder: &str, body: Bytes) -> Result<RequestEnvelope, ProxyError> {
    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{}?{}", remainder, query),
        None => remainder.to_string(),
    };

    RequestEnvelope::new(parts.method.clone(), path_and_query, &parts.headers, body).map_err(ProxyError::MalformedMultipart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let bytes = read_body(Body::from("hello"), &HeaderMap::new(), 5).await.unwrap();
        assert_eq!(bytes, "hello");
    }

    #[tokio::test]
    async fn test_read_body_over_limit() {
        let err = read_body(Body::from("hello world"), &HeaderMap::new(), 5).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { limit: 5 }));
    }

    #[tokio::test]
    async fn test_declared_length_checked_first() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, "1000".parse().unwrap());
        let err = read_body(Body::empty(), &headers, 10).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_envelope_keeps_query() {
        let (parts, _) = Request::builder()
            .method(Method::GET)
            .uri("/fo/typical/a?x=1&y=2")
            .body(())
            .unwrap()
            .into_parts();

        let envelope = envelope_from_parts(&parts, "/a", Bytes::new()).unwrap();
        assert_eq!(envelope.path_and_query(), "/a?x=1&y=2");
        assert_eq!(*envelope.method(), Method::GET);
    }

    #[test]
    fn test_malformed_multipart_rejected() {
        let (parts, _) = Request::builder()
            .method(Method::POST)
            .uri("/fo")
            .header("content-type", "multipart/form-data; boundary=b")
            .body(())
            .unwrap()
            .into_parts();

        let err = envelope_from_parts(&parts, "", Bytes::from_static(b"no delimiter here")).unwrap_err();
        assert!(matches!(err, ProxyError::MalformedMultipart(_)));
    }

    #[test]
    fn test_request_id_fallback() {
        assert_eq!(request_id(&HeaderMap::new()), "unknown");
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, "abc".parse().unwrap());
        assert_eq!(request_id(&headers), "abc");
    }
}
