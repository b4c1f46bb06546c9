//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: matched Route (→ FailoverGroup) or NoMatch
//!
//! Route Compilation (at startup and on reload):
//!     GroupConfig[]
//!     → Build FailoverGroups (adopting unchanged cursors)
//!     → Sort by prefix length, then priority
//!     → Freeze as immutable GroupRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled up front, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod matcher;
pub mod router;

pub use router::{GroupRouter, Route};
