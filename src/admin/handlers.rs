use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::lifecycle::shutdown::{Shutdown, ShutdownMode};
use crate::net::reload::TlsReloader;
use crate::nic::worker::ReconcileHandle;

#[derive(Clone)]
pub struct AdminState {
    pub reloader: TlsReloader,
    pub reconcile: ReconcileHandle,
    pub shutdown: Arc<Shutdown>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShutdownParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReloadStatus {
    pub tls_reloaded: bool,
    pub reconcile_queued: bool,
}

/// Request shutdown and answer once the agent server has stopped.
pub async fn shutdown(
    State(state): State<AdminState>,
    Query(params): Query<ShutdownParams>,
) -> Json<serde_json::Value> {
    let mode = if params.force {
        ShutdownMode::Force
    } else {
        ShutdownMode::Graceful
    };
    tracing::info!(mode = ?mode, "Shutdown requested over admin API");

    state.shutdown.trigger(mode);
    state.shutdown.wait_stopped().await;

    Json(serde_json::json!({ "status": "stopped" }))
}

/// Reload TLS material and queue a reconciliation pass.
pub async fn reload(State(state): State<AdminState>) -> Json<ReloadStatus> {
    let reloader = state.reloader.clone();
    let tls_reloaded = match tokio::task::spawn_blocking(move || reloader.reload()).await {
        Ok(result) => result.is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "TLS reload task failed");
            false
        }
    };

    Json(ReloadStatus {
        tls_reloaded,
        reconcile_queued: state.reconcile.request(),
    })
}
