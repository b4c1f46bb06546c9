//! Failover dispatch loop.
//!
//! # State Machine
//! ```text
//! START:      i := cursor.current_start()
//! TRYING(i):  send envelope to endpoints[i], classify
//!     Success → cursor.record_success(i) → SUCCESS
//!     Failure → every endpoint tried once?  → EXHAUSTED(last cause)
//!               otherwise sleep(interval), i := (i + 1) mod len → TRYING(i)
//! ```
//!
//! # Design Decisions
//! - One pass over the list per dispatch, wrapping at the end; the last
//!   endpoint tried is the one just before the start index
//! - Dropping the dispatch future aborts the in-flight attempt and leaves
//!   the cursor untouched
//! - Only the final failure cause is kept for the aggregated error

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use thiserror::Error;

use crate::failover::classifier::{classify, DispatchOutcome, FailureCause};
use crate::failover::envelope::RequestEnvelope;
use crate::failover::group::FailoverGroup;
use crate::failover::transport::Transport;
use crate::observability::metrics;

/// A successful dispatch.
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response<Body>,
    /// Cursor value this dispatch started probing at.
    pub start_index: usize,
    /// Endpoint that produced `response`.
    pub endpoint_index: usize,
    pub attempts: usize,
}

/// Every endpoint in the group failed once.
#[derive(Debug, Clone, Error)]
pub struct AggregatedFailure {
    pub last_cause: FailureCause,
    pub attempts: usize,
}

impl AggregatedFailure {
    /// Status surfaced to the caller.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl fmt::Display for AggregatedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_cause {
            FailureCause::Status { .. } => write!(
                f,
                "All the failover endpoints failed. Last endpoint returned response is: {}",
                self.last_cause
            ),
            FailureCause::Transport(_) => write!(
                f,
                "All the failover endpoints failed. Last error was {}",
                self.last_cause
            ),
        }
    }
}

/// Drives ordered failover attempts over a transport.
#[derive(Clone)]
pub struct FailoverDispatcher {
    transport: Arc<dyn Transport>,
}

impl FailoverDispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `envelope` to the group's endpoints, one at a time, until one succeeds.
    pub async fn dispatch(
        &self,
        group: &FailoverGroup,
        envelope: &RequestEnvelope,
    ) -> Result<Dispatched, AggregatedFailure> {
        let endpoints = group.endpoints();
        let len = endpoints.len();
        let start_index = group.cursor().current_start() % len;

        let mut index = start_index;
        let mut attempts = 1;

        loop {
            let endpoint = &endpoints[index];
            tracing::debug!(
                group = %group.name(),
                index,
                attempt = attempts,
                endpoint = %endpoint,
                "Trying failover endpoint"
            );

            let result = self.transport.send(endpoint, envelope, endpoint.timeout()).await;

            match classify(result, group.failure_codes()) {
                DispatchOutcome::Success(response) => {
                    group.cursor().record_success(index);
                    metrics::record_attempt(group.name(), endpoint.url().as_str(), "success");
                    metrics::record_cursor(group.name(), index);

                    tracing::debug!(
                        group = %group.name(),
                        index,
                        attempts,
                        status = %response.status(),
                        "Failover endpoint succeeded"
                    );
                    return Ok(Dispatched {
                        response,
                        start_index,
                        endpoint_index: index,
                        attempts,
                    });
                }
                DispatchOutcome::Failure(cause) => {
                    metrics::record_attempt(group.name(), endpoint.url().as_str(), cause.kind());
                    tracing::warn!(
                        group = %group.name(),
                        index,
                        attempt = attempts,
                        endpoint = %endpoint,
                        cause = %cause,
                        "Failover endpoint failed"
                    );

                    if attempts == len {
                        metrics::record_exhausted(group.name());
                        return Err(AggregatedFailure {
                            last_cause: cause,
                            attempts,
                        });
                    }

                    index = (index + 1) % len;
                    attempts += 1;

                    if !group.interval().is_zero() {
                        tokio::time::sleep(group.interval()).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::classifier::FailureCodes;
    use crate::failover::endpoint::Endpoint;
    use crate::failover::transport::TransportError;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};
    use futures_util::future::BoxFuture;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use url::Url;

    /// Scripted behavior per endpoint port.
    #[derive(Clone, Copy)]
    enum Script {
        Ok(&'static str),
        Status(u16),
        Timeout,
        Refused,
    }

    struct ScriptedTransport {
        scripts: Vec<Script>,
        calls: Mutex<Vec<(usize, Bytes)>>,
    }

    impl ScriptedTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn order(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|(i, _)| *i).collect()
        }

        fn bodies(&self) -> Vec<Bytes> {
            self.calls.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn send<'a>(
            &'a self,
            endpoint: &'a Endpoint,
            request: &'a RequestEnvelope,
            timeout: Duration,
        ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
            Box::pin(async move {
                // Endpoints are http://127.0.0.1:<10000 + index>.
                let index = endpoint.url().port().unwrap() as usize - 10_000;
                self.calls.lock().unwrap().push((index, request.body_bytes()));

                match self.scripts[index] {
                    Script::Ok(body) => Ok(Response::builder()
                        .status(200)
                        .header("content-type", "text/plain")
                        .body(Body::from(body))
                        .unwrap()),
                    Script::Status(code) => Ok(Response::builder().status(code).body(Body::empty()).unwrap()),
                    Script::Timeout => Err(TransportError::IdleTimeout { after: timeout }),
                    Script::Refused => Err(TransportError::Connect {
                        endpoint: endpoint.to_string(),
                        reason: "connection refused".into(),
                    }),
                }
            })
        }
    }

    fn group(len: usize, codes: &[u16]) -> FailoverGroup {
        let endpoints = (0..len)
            .map(|i| {
                Endpoint::new(
                    Url::parse(&format!("http://127.0.0.1:{}", 10_000 + i)).unwrap(),
                    Duration::from_millis(100),
                )
            })
            .collect();
        let codes = codes.iter().map(|c| StatusCode::from_u16(*c).unwrap()).collect();
        FailoverGroup::new("test", endpoints, codes, Duration::ZERO).unwrap()
    }

    fn envelope() -> RequestEnvelope {
        RequestEnvelope::new(Method::POST, "", &HeaderMap::new(), Bytes::from_static(b"{\"Name\":\"widget\"}")).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_first_endpoint_healthy() {
        let transport = ScriptedTransport::new(vec![Script::Ok("first"), Script::Ok("second")]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(2, &[]);

        let dispatched = dispatcher.dispatch(&group, &envelope()).await.unwrap();
        assert_eq!(dispatched.endpoint_index, 0);
        assert_eq!(dispatched.attempts, 1);
        assert_eq!(group.last_succeeded_index(), 0);
        assert_eq!(body_text(dispatched.response).await, "first");
        assert_eq!(transport.order(), vec![0]);
    }

    #[tokio::test]
    async fn test_fails_over_in_order_and_moves_cursor() {
        let transport = ScriptedTransport::new(vec![Script::Timeout, Script::Refused, Script::Ok("third")]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(3, &[]);

        let first = dispatcher.dispatch(&group, &envelope()).await.unwrap();
        assert_eq!(first.start_index, 0);
        assert_eq!(first.endpoint_index, 2);
        assert_eq!(first.attempts, 3);
        assert_eq!(group.last_succeeded_index(), 2);
        assert_eq!(transport.order(), vec![0, 1, 2]);

        // The next call starts at the endpoint that worked.
        let second = dispatcher.dispatch(&group, &envelope()).await.unwrap();
        assert_eq!(second.start_index, 2);
        assert_eq!(second.endpoint_index, 2);
        assert_eq!(second.attempts, 1);
        assert_eq!(transport.order(), vec![0, 1, 2, 2]);
    }

    #[tokio::test]
    async fn test_wraps_around_from_cursor() {
        let transport = ScriptedTransport::new(vec![Script::Ok("zero"), Script::Status(503), Script::Timeout]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(3, &[503]);
        group.cursor().record_success(1);

        let dispatched = dispatcher.dispatch(&group, &envelope()).await.unwrap();
        assert_eq!(dispatched.endpoint_index, 0);
        assert_eq!(transport.order(), vec![1, 2, 0]);
        assert_eq!(group.last_succeeded_index(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_by_timeout() {
        let transport = ScriptedTransport::new(vec![Script::Timeout, Script::Timeout, Script::Timeout]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(3, &[]);

        let failure = dispatcher.dispatch(&group, &envelope()).await.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            failure.to_string(),
            "All the failover endpoints failed. Last error was Idle timeout triggered before initiating inbound response"
        );
        assert_eq!(group.last_succeeded_index(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_by_status_code() {
        let transport = ScriptedTransport::new(vec![Script::Status(503), Script::Status(503)]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(2, &[503]);

        let failure = dispatcher.dispatch(&group, &envelope()).await.unwrap_err();
        assert_eq!(
            failure.to_string(),
            "All the failover endpoints failed. Last endpoint returned response is: 503 Service Unavailable"
        );
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_cause_after_wrap() {
        let transport = ScriptedTransport::new(vec![Script::Status(500), Script::Timeout, Script::Refused]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(3, &[500]);
        group.cursor().record_success(1);

        let failure = dispatcher.dispatch(&group, &envelope()).await.unwrap_err();
        assert_eq!(transport.order(), vec![1, 2, 0]);
        assert!(matches!(failure.last_cause, FailureCause::Status { status, .. } if status == 500));
        assert_eq!(group.last_succeeded_index(), 1);
    }

    #[tokio::test]
    async fn test_unlisted_error_status_is_relayed() {
        let transport = ScriptedTransport::new(vec![Script::Status(500), Script::Ok("unused")]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(2, &[503]);

        let dispatched = dispatcher.dispatch(&group, &envelope()).await.unwrap();
        assert_eq!(dispatched.response.status(), 500);
        assert_eq!(transport.order(), vec![0]);
    }

    #[tokio::test]
    async fn test_same_body_sent_to_every_endpoint() {
        let transport = ScriptedTransport::new(vec![Script::Refused, Script::Timeout, Script::Ok("ok")]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let group = group(3, &[]);

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "multipart/form-data; boundary=b".parse().unwrap());
        let body = Bytes::from_static(
            b"--b\r\nContent-Disposition: form-data; name=\"foo\"\r\n\r\nPart1\r\n--b--\r\n",
        );
        let envelope = RequestEnvelope::new(Method::POST, "", &headers, body).unwrap();

        dispatcher.dispatch(&group, &envelope).await.unwrap();
        let bodies = transport.bodies();
        assert_eq!(bodies.len(), 3);
        assert!(bodies.iter().all(|b| *b == bodies[0]));
        assert!(String::from_utf8_lossy(&bodies[0]).contains("content-id: 0"));
    }

    #[tokio::test]
    async fn test_interval_between_attempts() {
        let transport = ScriptedTransport::new(vec![Script::Refused, Script::Refused, Script::Ok("ok")]);
        let dispatcher = FailoverDispatcher::new(transport.clone());
        let endpoints = (0..3)
            .map(|i| {
                Endpoint::new(
                    Url::parse(&format!("http://127.0.0.1:{}", 10_000 + i)).unwrap(),
                    Duration::from_millis(100),
                )
            })
            .collect();
        let group = FailoverGroup::new("spaced", endpoints, FailureCodes::default(), Duration::from_millis(50)).unwrap();

        let started = Instant::now();
        dispatcher.dispatch(&group, &envelope()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_leaves_cursor() {
        struct Hanging;
        impl Transport for Hanging {
            fn send<'a>(
                &'a self,
                _endpoint: &'a Endpoint,
                _request: &'a RequestEnvelope,
                _timeout: Duration,
            ) -> BoxFuture<'a, Result<Response<Body>, TransportError>> {
                Box::pin(futures_util::future::pending())
            }
        }

        let dispatcher = FailoverDispatcher::new(Arc::new(Hanging));
        let group = group(3, &[]);
        group.cursor().record_success(1);

        let envelope = envelope();
        let result = tokio::time::timeout(Duration::from_millis(50), dispatcher.dispatch(&group, &envelope)).await;
        assert!(result.is_err());
        assert_eq!(group.last_succeeded_index(), 1);
    }
}
