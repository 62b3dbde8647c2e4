//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Request (signal or admin API) → Stop accepting → Drain connections → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Graceful shutdown, repeated → Forced
//!     SIGHUP → TLS reload + reconciliation pass
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownMode, ShutdownSignal};
