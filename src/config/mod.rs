//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FailoverConfig (validated, immutable)
//!     → compiled into failover groups + route table
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps its state; unchanged groups keep their cursor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::FailoverConfig;
pub use schema::ListenerConfig;
pub use schema::GroupConfig;
pub use schema::EndpointConfig;
pub use schema::TimeoutConfig;
pub use schema::LimitsConfig;
pub use schema::ObservabilityConfig;
pub use schema::AdminConfig;
