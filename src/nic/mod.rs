//! Network interface reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! <config_dir>/<device>.json
//!     → config.rs (parse, index by MAC address)
//!     → link.rs (rtnetlink link dump)
//!     → reconcile.rs (match by MAC, apply name/MTU per interface)
//!         → link.rs (down, rename, MTU, up as netlink set requests)
//!         → resilience::revert (undo on any failed step)
//!
//! Triggers (startup, watcher, SIGHUP, admin):
//!     → worker.rs (one queue, one pass at a time)
//! ```
//!
//! # Design Decisions
//! - The directory is re-read on every pass; nothing is cached
//! - A missing directory means nothing is declared, not an error
//! - Kernel modules load before any file is parsed
//! - A parse error aborts the pass before any interface is touched
//! - A link failure rolls back that interface only

pub mod config;
pub mod link;
pub mod reconcile;
pub mod worker;

pub use config::NicConfig;
pub use link::{IpLink, LinkControl, LinkError, LiveInterface};
pub use reconcile::NicReconciler;
pub use worker::ReconcileHandle;
