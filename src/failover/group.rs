//! Failover group: ordered endpoints plus the cursor they share.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::validation::check_endpoint_url;
use crate::config::{GroupConfig, TimeoutConfig};
use crate::failover::classifier::FailureCodes;
use crate::failover::cursor::FailoverCursor;
use crate::failover::endpoint::Endpoint;

/// Errors building a group from configuration.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("failover group '{0}' has no endpoints")]
    NoEndpoints(String),

    #[error("failover group '{group}' endpoint '{url}': {reason}")]
    InvalidEndpoint { group: String, url: String, reason: String },

    #[error("failover group '{group}' has invalid failover code {code}")]
    InvalidStatusCode { group: String, code: u16 },

    #[error("failover group '{0}' is defined more than once")]
    DuplicateName(String),
}

/// A resiliency unit: endpoints are tried in order, starting at the cursor.
#[derive(Debug)]
pub struct FailoverGroup {
    name: String,
    endpoints: Vec<Endpoint>,
    failure_codes: FailureCodes,
    interval: Duration,
    cursor: Arc<FailoverCursor>,
}

impl FailoverGroup {
    /// Create a group. At least one endpoint is required.
    pub fn new(
        name: impl Into<String>,
        endpoints: Vec<Endpoint>,
        failure_codes: FailureCodes,
        interval: Duration,
    ) -> Result<Self, GroupError> {
        let name = name.into();
        if endpoints.is_empty() {
            return Err(GroupError::NoEndpoints(name));
        }
        let cursor = Arc::new(FailoverCursor::new(endpoints.len()));
        Ok(Self {
            name,
            endpoints,
            failure_codes,
            interval,
            cursor,
        })
    }

    /// Build a group from its configuration section.
    pub fn from_config(config: &GroupConfig, timeouts: &TimeoutConfig) -> Result<Self, GroupError> {
        let group_timeout = config.timeout_ms.unwrap_or(timeouts.endpoint_ms);

        let endpoints = config
            .endpoints
            .iter()
            .map(|e| {
                let url = check_endpoint_url(&e.url).map_err(|reason| GroupError::InvalidEndpoint {
                    group: config.name.clone(),
                    url: e.url.clone(),
                    reason,
                })?;
                let timeout = Duration::from_millis(e.timeout_ms.unwrap_or(group_timeout));
                Ok(Endpoint::new(url, timeout))
            })
            .collect::<Result<Vec<_>, GroupError>>()?;

        let failure_codes = config
            .failover_codes
            .iter()
            .map(|&code| {
                StatusCode::from_u16(code).map_err(|_| GroupError::InvalidStatusCode {
                    group: config.name.clone(),
                    code,
                })
            })
            .collect::<Result<FailureCodes, GroupError>>()?;

        Self::new(
            config.name.clone(),
            endpoints,
            failure_codes,
            Duration::from_millis(config.interval_ms),
        )
    }

    /// Share `previous`'s cursor if both groups target the same endpoint URLs.
    ///
    /// Returns true when the cursor was adopted.
    pub fn adopt_cursor(&mut self, previous: &FailoverGroup) -> bool {
        let same_targets = self.name == previous.name
            && self.endpoints.len() == previous.endpoints.len()
            && self
                .endpoints
                .iter()
                .zip(&previous.endpoints)
                .all(|(a, b)| a.url() == b.url());
        if same_targets {
            self.cursor = previous.cursor.clone();
        }
        same_targets
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn failure_codes(&self) -> &FailureCodes {
        &self.failure_codes
    }

    /// Delay between a failed attempt and the next endpoint.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn cursor(&self) -> &FailoverCursor {
        &self.cursor
    }

    /// Index of the endpoint that succeeded most recently (0 before any success).
    pub fn last_succeeded_index(&self) -> usize {
        self.cursor.current_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;

    fn config(urls: &[&str]) -> GroupConfig {
        GroupConfig {
            name: "typical".into(),
            path_prefix: "/fo/typical".into(),
            host: None,
            priority: 0,
            endpoints: urls.iter().map(|u| EndpointConfig::new(*u)).collect(),
            timeout_ms: Some(1500),
            interval_ms: 25,
            failover_codes: vec![503, 500],
        }
    }

    #[test]
    fn test_from_config() {
        let mut cfg = config(&["http://127.0.0.1:1/a", "http://127.0.0.1:2/b"]);
        cfg.endpoints[1].timeout_ms = Some(200);

        let group = FailoverGroup::from_config(&cfg, &TimeoutConfig::default()).unwrap();
        assert_eq!(group.name(), "typical");
        assert_eq!(group.endpoints().len(), 2);
        assert_eq!(group.endpoints()[0].timeout(), Duration::from_millis(1500));
        assert_eq!(group.endpoints()[1].timeout(), Duration::from_millis(200));
        assert_eq!(group.interval(), Duration::from_millis(25));
        assert!(group.failure_codes().contains(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(group.last_succeeded_index(), 0);
    }

    #[test]
    fn test_group_timeout_falls_back_to_default() {
        let mut cfg = config(&["http://127.0.0.1:1"]);
        cfg.timeout_ms = None;
        let timeouts = TimeoutConfig { endpoint_ms: 750, ..TimeoutConfig::default() };
        let group = FailoverGroup::from_config(&cfg, &timeouts).unwrap();
        assert_eq!(group.endpoints()[0].timeout(), Duration::from_millis(750));
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = FailoverGroup::from_config(&config(&[]), &TimeoutConfig::default()).unwrap_err();
        assert!(matches!(err, GroupError::NoEndpoints(name) if name == "typical"));
    }

    #[test]
    fn test_invalid_code_rejected() {
        let mut cfg = config(&["http://127.0.0.1:1"]);
        cfg.failover_codes = vec![42];
        let err = FailoverGroup::from_config(&cfg, &TimeoutConfig::default()).unwrap_err();
        assert!(matches!(err, GroupError::InvalidStatusCode { code: 42, .. }));
    }

    #[test]
    fn test_adopt_cursor_when_targets_unchanged() {
        let cfg = config(&["http://127.0.0.1:1", "http://127.0.0.1:2", "http://127.0.0.1:3"]);
        let old = FailoverGroup::from_config(&cfg, &TimeoutConfig::default()).unwrap();
        old.cursor().record_success(2);

        let mut same = FailoverGroup::from_config(&cfg, &TimeoutConfig::default()).unwrap();
        assert!(same.adopt_cursor(&old));
        assert_eq!(same.last_succeeded_index(), 2);

        let changed_cfg = config(&["http://127.0.0.1:1", "http://127.0.0.1:9"]);
        let mut changed = FailoverGroup::from_config(&changed_cfg, &TimeoutConfig::default()).unwrap();
        assert!(!changed.adopt_cursor(&old));
        assert_eq!(changed.last_succeeded_index(), 0);
    }
}
