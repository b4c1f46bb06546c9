//! Endpoint failure classification.
//!
//! # Responsibilities
//! - Turn one attempt's result into success or a failover-triggering failure
//! - Apply the group's configured failure status codes
//!
//! # Design Decisions
//! - Transport errors and timeouts always fail over
//! - Any status not configured as a failure is a success, including 4xx/5xx
//! - Pure function of the outcome and configuration

use std::collections::BTreeSet;
use std::fmt;

use axum::body::Body;
use axum::http::{Response, StatusCode};

use crate::failover::transport::TransportError;

/// Status codes that count as endpoint failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureCodes(BTreeSet<StatusCode>);

impl FailureCodes {
    pub fn contains(&self, status: StatusCode) -> bool {
        self.0.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Codes in ascending order.
    pub fn as_u16s(&self) -> Vec<u16> {
        self.0.iter().map(StatusCode::as_u16).collect()
    }
}

impl FromIterator<StatusCode> for FailureCodes {
    fn from_iter<I: IntoIterator<Item = StatusCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Why an attempt counted as a failure.
#[derive(Debug, Clone)]
pub enum FailureCause {
    /// Connection error or timeout before the response started.
    Transport(TransportError),
    /// A response arrived with a status configured as a failure.
    Status { status: StatusCode, reason: String },
}

impl FailureCause {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureCause::Transport(TransportError::IdleTimeout { .. }))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureCause::Transport(TransportError::IdleTimeout { .. }) => "timeout",
            FailureCause::Transport(_) => "transport",
            FailureCause::Status { .. } => "status",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Transport(e) => write!(f, "{}", e),
            FailureCause::Status { status, reason } if reason.is_empty() => {
                write!(f, "{}", status.as_u16())
            }
            FailureCause::Status { status, reason } => write!(f, "{} {}", status.as_u16(), reason),
        }
    }
}

/// Result of one attempt after classification.
#[derive(Debug)]
pub enum DispatchOutcome {
    Success(Response<Body>),
    Failure(FailureCause),
}

/// Classify one attempt's result against the configured failure codes.
pub fn classify(result: Result<Response<Body>, TransportError>, codes: &FailureCodes) -> DispatchOutcome {
    match result {
        Err(e) => DispatchOutcome::Failure(FailureCause::Transport(e)),
        Ok(response) if codes.contains(response.status()) => DispatchOutcome::Failure(FailureCause::Status {
            status: response.status(),
            reason: reason_phrase(&response),
        }),
        Ok(response) => DispatchOutcome::Success(response),
    }
}

// hyper keeps non-canonical reason phrases as an extension.
fn reason_phrase(response: &Response<Body>) -> String {
    match response.extensions().get::<hyper::ext::ReasonPhrase>() {
        Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
        None => response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string(),
    }
}
