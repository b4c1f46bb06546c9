//! Failover HTTP proxy library.
//!
//! Forwards each inbound request to the first healthy endpoint of a failover
//! group, remembering the last endpoint that worked.

pub mod admin;
pub mod config;
pub mod failover;
pub mod http;
pub mod lifecycle;
pub mod multipart;
pub mod observability;
pub mod routing;

pub use config::schema::FailoverConfig;
pub use failover::{FailoverDispatcher, FailoverGroup};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
