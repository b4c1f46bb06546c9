//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, status codes, addresses)
//! - Check endpoint URLs are usable by the transport
//! - Detect duplicate group names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FailoverConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{FailoverConfig, GroupConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidAddress { field: &'static str, value: String },
    ZeroTimeout { field: String },
    DuplicateGroup(String),
    InvalidPathPrefix { group: String, prefix: String },
    NoEndpoints(String),
    InvalidEndpointUrl { group: String, url: String, reason: String },
    InvalidStatusCode { group: String, code: u16 },
    ZeroBodyLimit,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidAddress { field, value } => {
                write!(f, "{} '{}' is not a valid socket address", field, value)
            }
            ValidationError::ZeroTimeout { field } => write!(f, "{} must be greater than 0", field),
            ValidationError::DuplicateGroup(name) => write!(f, "group '{}' is defined more than once", name),
            ValidationError::InvalidPathPrefix { group, prefix } => {
                write!(f, "group '{}' path_prefix '{}' must start with '/'", group, prefix)
            }
            ValidationError::NoEndpoints(group) => write!(f, "group '{}' has no endpoints", group),
            ValidationError::InvalidEndpointUrl { group, url, reason } => {
                write!(f, "group '{}' endpoint '{}': {}", group, url, reason)
            }
            ValidationError::InvalidStatusCode { group, code } => {
                write!(f, "group '{}' failover code {} is not an HTTP status", group, code)
            }
            ValidationError::ZeroBodyLimit => write!(f, "limits.max_body_bytes must be greater than 0"),
        }
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &FailoverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.connect_ms".into() });
    }
    if config.timeouts.endpoint_ms == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.endpoint_ms".into() });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeouts.request_secs".into() });
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let mut names = HashSet::new();
    for group in &config.groups {
        if !names.insert(group.name.as_str()) {
            errors.push(ValidationError::DuplicateGroup(group.name.clone()));
        }
        validate_group(&mut errors, group);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_group(errors: &mut Vec<ValidationError>, group: &GroupConfig) {
    if !group.path_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPathPrefix {
            group: group.name.clone(),
            prefix: group.path_prefix.clone(),
        });
    }

    if group.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints(group.name.clone()));
    }

    if group.timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout { field: format!("groups.{}.timeout_ms", group.name) });
    }

    for endpoint in &group.endpoints {
        if let Err(reason) = check_endpoint_url(&endpoint.url) {
            errors.push(ValidationError::InvalidEndpointUrl {
                group: group.name.clone(),
                url: endpoint.url.clone(),
                reason,
            });
        }
        if endpoint.timeout_ms == Some(0) {
            errors.push(ValidationError::ZeroTimeout {
                field: format!("groups.{}.endpoints[{}].timeout_ms", group.name, endpoint.url),
            });
        }
    }

    for &code in &group.failover_codes {
        if !(100..=999).contains(&code) {
            errors.push(ValidationError::InvalidStatusCode { group: group.name.clone(), code });
        }
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress { field, value: value.to_string() });
    }
}

/// The bundled transport speaks plain HTTP only.
pub(crate) fn check_endpoint_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url)
}
