//! Shared application state passed to every handler via Axum's `State`
//! extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::instance::InstanceId;
use crate::sessions::SessionLifecycleManager;

/// Shared application state for the sessiond server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// This instance's fleet-unique identity.
    pub instance_id: InstanceId,
    /// Orchestrates the session lifecycle (init/keep-alive/release/sweep).
    pub sessions: SessionLifecycleManager,
}
