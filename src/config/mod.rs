//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! agent.toml
//!     → loader.rs (parse, warn about unknown keys, deserialize)
//!     → AgentConfig (immutable for the life of the process)
//!
//! Watched directories (NIC configs, certificates):
//!     watcher.rs detects change
//!     → unit event on an mpsc channel
//!     → consumer re-runs reconciliation or rebuilds TLS
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Unknown keys are warnings, type errors are failures

pub mod loader;
pub mod schema;
pub mod watcher;

pub use schema::AgentConfig;
pub use schema::ListenerConfig;
pub use schema::LoggingConfig;
pub use schema::NicSettings;
pub use schema::TlsConfig;
