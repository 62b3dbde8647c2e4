//! HTTPS server on top of the hot-swappable TLS listener.
//!
//! # Responsibilities
//! - Accept loop with a connection limit (backpressure)
//! - One task per connection: TLS handshake, then HTTP/1.1 or HTTP/2
//! - Track connections so graceful shutdown can drain them
//! - Serve the agent API router

use axum::{routing::get, Json, Router};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;

use crate::lifecycle::shutdown::{ShutdownMode, ShutdownSignal};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::HotSwapTlsListener;

/// Pause after a failed accept so resource exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Default time a client gets to complete the TLS handshake.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AgentStatus {
    pub status: &'static str,
    pub version: &'static str,
}

async fn get_status() -> Json<AgentStatus> {
    Json(AgentStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the agent API router.
pub fn agent_router() -> Router {
    Router::new()
        .route("/1.0", get(get_status))
        .layer(TraceLayer::new_for_http())
}

/// HTTPS server for the agent API.
pub struct AgentServer {
    listener: Arc<HotSwapTlsListener>,
    router: Router,
    connection_limit: Arc<Semaphore>,
    handshake_timeout: Duration,
    tracker: ConnectionTracker,
}

impl AgentServer {
    pub fn new(listener: Arc<HotSwapTlsListener>, max_connections: usize) -> Self {
        Self {
            listener,
            router: agent_router(),
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Drop connections that have not finished the TLS handshake in time.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Accept and serve connections until shutdown is requested.
    ///
    /// Returns once the listener has stopped accepting and, for a graceful
    /// shutdown, every open connection has finished.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let addr = self.listener.local_addr().ok();
        tracing::info!(address = ?addr, "Agent server starting");

        let mode = loop {
            let permit = tokio::select! {
                permit = self.connection_limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break ShutdownMode::Graceful,
                },
                mode = shutdown.recv() => break mode,
            };

            let handshake = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(handshake) => handshake,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                },
                mode = shutdown.recv() => break mode,
            };

            let guard = self.tracker.track();
            let router = self.router.clone();
            let mut conn_shutdown = shutdown.clone();
            let handshake_timeout = self.handshake_timeout;

            tokio::spawn(async move {
                let _permit = permit;
                let peer_addr = handshake.peer_addr();
                let stream = tokio::select! {
                    stream = tokio::time::timeout(handshake_timeout, handshake.finish()) => match stream {
                        Ok(Ok(stream)) => stream,
                        Ok(Err(e)) => {
                            tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, error = %e, "TLS handshake failed");
                            return;
                        }
                        Err(_) => {
                            tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, "TLS handshake timed out");
                            return;
                        }
                    },
                    _ = conn_shutdown.recv() => return,
                };

                let builder = Builder::new(TokioExecutor::new());
                let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(router));
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    mode = conn_shutdown.recv() => {
                        if mode == ShutdownMode::Force {
                            return;
                        }
                        conn.as_mut().graceful_shutdown();
                        tokio::select! {
                            result = conn.as_mut() => result,
                            _ = conn_shutdown.forced() => return,
                        }
                    }
                };

                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer_addr = %peer_addr, error = %e, "Connection error");
                }
            });
        };

        tracing::info!(mode = ?mode, active = self.tracker.active_count(), "Agent server stopped accepting");

        if mode == ShutdownMode::Graceful {
            tokio::select! {
                _ = self.tracker.wait_for_drain() => {}
                _ = shutdown.forced() => {}
            }
        }

        tracing::info!("Agent server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reports_version() {
        let Json(status) = get_status().await;

        assert_eq!(status.status, "ok");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
    }
}
