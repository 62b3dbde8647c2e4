//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TlsHandshake (from net::listener)
//!     → server.rs (handshake, HTTP/1.1 or HTTP/2 detection)
//!     → agent_router (GET /1.0)
//!     → Send to client
//! ```

pub mod server;

pub use server::{agent_router, AgentServer};
