//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Multi-step change against a resource without transactions:
//!     → apply step, register its undo in revert.rs
//!     → on failure: undo registered steps newest first
//!     → on success: discard the undo log
//! ```
//!
//! # Design Decisions
//! - Undo actions are best-effort and never abort the unwind
//! - Dropping the log without committing reverts, so early returns are safe

pub mod revert;

pub use revert::Reverter;
