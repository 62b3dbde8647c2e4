//! Local control API.
//!
//! Plain HTTP on a loopback address, used by `agent-cli` to stop the agent
//! or trigger a reload.

pub mod handlers;

use axum::{
    routing::{post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use self::handlers::*;

pub use self::handlers::AdminState;

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/internal/shutdown", put(shutdown))
        .route("/internal/reload", post(reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
