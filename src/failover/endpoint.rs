//! Endpoint abstraction.

use std::fmt;
use std::time::Duration;

use axum::http::Uri;
use url::{Position, Url};

use crate::failover::transport::TransportError;

/// One candidate upstream target. Immutable once its group is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    timeout: Duration,
}

impl Endpoint {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self { url, timeout }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Per-attempt timeout for this endpoint.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the upstream URI for a request.
    ///
    /// `path_and_query` is the part of the inbound path below the group's
    /// prefix (empty or starting with `/`) plus the inbound query. It is
    /// appended to the endpoint's own path; queries from both are joined.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, TransportError> {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let mut target = String::from(&self.url[..Position::BeforePath]);
        let base = self.url.path().trim_end_matches('/');
        if path.is_empty() {
            target.push_str(if base.is_empty() { "/" } else { self.url.path() });
        } else {
            target.push_str(base);
            target.push_str(path);
        }

        let queries: Vec<&str> = self
            .url
            .query()
            .into_iter()
            .chain(query)
            .filter(|q| !q.is_empty())
            .collect();
        if !queries.is_empty() {
            target.push('?');
            target.push_str(&queries.join("&"));
        }

        Uri::try_from(target.as_str()).map_err(|e| TransportError::Request(format!("{}: {}", target, e)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
