//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// `GET /api/health` — liveness probe.
///
/// Returns status, uptime, version, instance id, and the number of sessions
/// hosted locally. No authentication required, suitable for load-balancer
/// health checks.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let sessions = state.sessions.local_session_count().await;

    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "instance_id": state.instance_id.as_str(),
        "local_sessions": sessions,
    }))
}
