//! OS signal handling.
//!
//! # Responsibilities
//! - SIGTERM/SIGINT request a graceful shutdown; a second one forces it
//! - SIGHUP reloads TLS material and queues a reconciliation pass

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::{Shutdown, ShutdownMode};
use crate::net::reload::TlsReloader;
use crate::nic::worker::ReconcileHandle;

/// Install the handlers and spawn the task that serves them.
pub fn spawn(
    shutdown: Arc<Shutdown>,
    reloader: TlsReloader,
    reconcile: ReconcileHandle,
) -> std::io::Result<JoinHandle<()>> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = terminate.recv() => escalate(&shutdown, "SIGTERM"),
                _ = interrupt.recv() => escalate(&shutdown, "SIGINT"),
                _ = hangup.recv() => {
                    tracing::info!("SIGHUP received, reloading");
                    let reloader = reloader.clone();
                    // Errors are logged by the reloader.
                    let _ = tokio::task::spawn_blocking(move || reloader.reload()).await;
                    reconcile.request();
                }
            }
        }
    }))
}

fn escalate(shutdown: &Shutdown, name: &str) {
    let mode = match shutdown.requested() {
        None => ShutdownMode::Graceful,
        Some(_) => ShutdownMode::Force,
    };
    tracing::info!(signal = name, mode = ?mode, "Shutdown signal received");
    shutdown.trigger(mode);
}
