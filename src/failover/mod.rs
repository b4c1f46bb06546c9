//! Failover subsystem.
//!
//! # Data Flow
//! ```text
//! RequestEnvelope (buffered, multipart materialized once)
//!     → dispatcher.rs (START → TRYING(i) → SUCCESS | TRYING(i+1) | EXHAUSTED)
//!         → transport.rs (send to endpoints[i] with per-attempt timeout)
//!         → classifier.rs (success, transport failure, or failure status)
//!         → cursor.rs (record the index that succeeded)
//!     → Dispatched response, or AggregatedFailure
//! ```
//!
//! # Design Decisions
//! - Attempts are strictly sequential; each endpoint is tried at most once
//!   per dispatch, starting at the cursor and wrapping around the list
//! - The cursor is a single atomic word owned by its group and only written
//!   after a successful attempt
//! - Transport is a trait so the hosting layer and tests choose the client

pub mod classifier;
pub mod cursor;
pub mod dispatcher;
pub mod endpoint;
pub mod envelope;
pub mod group;
pub mod transport;

pub use classifier::{classify, DispatchOutcome, FailureCause, FailureCodes};
pub use cursor::FailoverCursor;
pub use dispatcher::{AggregatedFailure, Dispatched, FailoverDispatcher};
pub use endpoint::Endpoint;
pub use envelope::{EnvelopeBody, RequestEnvelope};
pub use group::{FailoverGroup, GroupError};
pub use transport::{HyperTransport, Transport, TransportError};
