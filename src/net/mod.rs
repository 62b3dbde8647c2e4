//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, snapshot current TLS config)
//!     → TlsHandshake::finish (server handshake under that snapshot)
//!     → connection.rs (lifecycle tracking)
//!     → Hand off to HTTP layer
//!
//! Certificate change / SIGHUP / admin reload:
//!     tls.rs builds a new ServerConfig
//!     → listener.set_config (atomic swap)
//!     → only connections accepted afterwards use it
//! ```
//!
//! # Design Decisions
//! - A failed rebuild leaves the installed configuration in place
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
pub mod reload;
pub mod tls;

pub use listener::{HotSwapTlsListener, TlsHandshake};
pub use reload::TlsReloader;
