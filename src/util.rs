//! Small helpers shared across modules.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current timestamp in milliseconds.
pub fn now_ms() -> u64 {
    #[allow(clippy::cast_possible_truncation)]
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// First 8 characters of a session token, for logging. Full tokens are
/// bearer credentials and must never reach the logs.
pub fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
