//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout layers)
//!     → routing (path prefix / host → FailoverGroup)
//!     → request.rs (bounded body read, RequestEnvelope)
//!     → failover dispatcher (ordered attempts)
//!     → response.rs (relay winner or render ProxyError)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ProxyError, X_FAILOVER_ENDPOINT_INDEX, X_FAILOVER_START_INDEX};
pub use server::{AppState, HttpServer};
