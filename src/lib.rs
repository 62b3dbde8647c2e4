//! Host agent library.
//!
//! Reconciles network interfaces against per-device JSON descriptions and
//! serves an HTTPS API whose certificate can be replaced without a restart.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod nic;
pub mod observability;
pub mod resilience;

pub use config::schema::AgentConfig;
pub use http::AgentServer;
pub use lifecycle::Shutdown;
pub use net::HotSwapTlsListener;
pub use nic::NicReconciler;
pub use resilience::Reverter;
