//! Route lookup.
//!
//! # Responsibilities
//! - Compile failover groups into routes
//! - Look up the route for a request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over routes sorted most-specific first
//! - Explicit NoMatch rather than silent default

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

use crate::config::FailoverConfig;
use crate::failover::{FailoverGroup, GroupError};
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// A compiled route to one failover group.
#[derive(Debug)]
pub struct Route {
    pub group: Arc<FailoverGroup>,
    pub path_prefix: String,
    pub priority: u32,
    matcher: AndMatcher,
}

impl Route {
    /// The request path below this route's prefix: empty or starting with `/`.
    pub fn remainder(&self, path: &str) -> String {
        let rest = path.strip_prefix(self.path_prefix.as_str()).unwrap_or(path);
        if rest.is_empty() || rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        }
    }
}

/// Route table over all configured failover groups.
#[derive(Debug, Default)]
pub struct GroupRouter {
    routes: Vec<Route>,
}

impl GroupRouter {
    /// Compile the groups of `config`.
    ///
    /// Group names must be unique. Groups that also exist in `previous` with
    /// the same endpoint URLs keep their failover cursor.
    pub fn from_config(config: &FailoverConfig, previous: Option<&GroupRouter>) -> Result<Self, GroupError> {
        let mut names = HashSet::with_capacity(config.groups.len());
        if let Some(dup) = config.groups.iter().find(|g| !names.insert(g.name.as_str())) {
            return Err(GroupError::DuplicateName(dup.name.clone()));
        }

        let mut routes = Vec::with_capacity(config.groups.len());

        for group_config in &config.groups {
            let mut group = FailoverGroup::from_config(group_config, &config.timeouts)?;

            if let Some(old) = previous.and_then(|p| p.group(group.name())) {
                if group.adopt_cursor(old) {
                    tracing::debug!(
                        group = %group.name(),
                        cursor = group.last_succeeded_index(),
                        "Kept failover cursor across reload"
                    );
                }
            }

            let mut matchers: Vec<Box<dyn Matcher>> =
                vec![Box::new(PathPrefixMatcher::new(group_config.path_prefix.clone()))];
            if let Some(host) = &group_config.host {
                matchers.push(Box::new(HostMatcher::new(host.clone())));
            }

            routes.push(Route {
                group: Arc::new(group),
                path_prefix: group_config.path_prefix.clone(),
                priority: group_config.priority,
                matcher: AndMatcher::new(matchers),
            });
        }

        // Longest prefix first, then priority; stable sort keeps declaration order.
        routes.sort_by(|a, b| {
            b.path_prefix
                .len()
                .cmp(&a.path_prefix.len())
                .then(b.priority.cmp(&a.priority))
        });

        Ok(Self { routes })
    }

    /// First route matching the request.
    pub fn match_request(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(req))
    }

    /// Groups in match order.
    pub fn groups(&self) -> impl Iterator<Item = &Arc<FailoverGroup>> {
        self.routes.iter().map(|r| &r.group)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn group(&self, name: &str) -> Option<&FailoverGroup> {
        self.routes
            .iter()
            .map(|r| r.group.as_ref())
            .find(|g| g.name() == name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
