//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems emit `tracing` events with structured fields
//!     → logging.rs (EnvFilter → fmt layer, pretty or JSON)
//!     → stderr/stdout, collected by the service manager
//! ```

pub mod logging;
