//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `SESSIOND_LISTEN`, `SESSIOND_STORE_URL`,
//!    `SESSIOND_TOKEN_SECRET`
//! 2. **Config file** — path via `--config <path>`, or `sessiond.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:7070"
//!
//! [session]
//! timeout_ms = 1800000        # 30 min; values below 30000 are clamped up
//! sweep_interval_ms = 60000
//! connect_timeout_ms = 30000
//!
//! [store]
//! url = "redis://127.0.0.1:6379"
//! op_timeout_ms = 2000
//!
//! [token]
//! secret = "your-signing-secret"
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Sessions shorter than this are not allowed; shorter configured values are
/// clamped up during load.
pub const MIN_SESSION_TIMEOUT_MS: u64 = 30_000;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:7070`).
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// Session lifecycle timing.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle timeout and TTL for a session in milliseconds (default 30 min).
    /// Drives token expiry, store TTLs, and the local staleness sweep.
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,
    /// Interval between expiry sweeps in milliseconds (default 60 s).
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Bound on SSH connect + auth in milliseconds (default 30 s).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Distributed session store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store URL (default `redis://127.0.0.1:6379`). Override with
    /// `SESSIOND_STORE_URL`.
    #[serde(default = "default_store_url")]
    pub url: String,
    /// Bound on each store operation in milliseconds (default 2 s). Keep-alive
    /// reads that exceed this fail closed rather than granting stale access.
    #[serde(default = "default_store_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

/// Session token signing settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC signing secret shared by every instance in the fleet.
    /// Defaults to `"change-me"` which triggers a startup warning.
    #[serde(default = "default_token_secret")]
    pub secret: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:7070".to_string()
}
fn default_session_timeout_ms() -> u64 {
    1_800_000
}
fn default_sweep_interval_ms() -> u64 {
    60_000
}
fn default_connect_timeout_ms() -> u64 {
    30_000
}
fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_store_op_timeout_ms() -> u64 {
    2_000
}
fn default_token_secret() -> String {
    "change-me".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            op_timeout_ms: default_store_op_timeout_ms(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: default_token_secret(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            store: StoreConfig::default(),
            token: TokenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, reads that file (panics on failure). Otherwise looks
    /// for `sessiond.toml` in the current directory, falling back to compiled
    /// defaults. `session.timeout_ms` is clamped to [`MIN_SESSION_TIMEOUT_MS`].
    pub fn load(path: Option<&str>) -> Self {
        let mut config = if let Some(p) = path {
            let content = std::fs::read_to_string(p)
                .unwrap_or_else(|e| panic!("Failed to read config file {p}: {e}"));
            toml::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse config file {p}: {e}"))
        } else if Path::new("sessiond.toml").exists() {
            let content =
                std::fs::read_to_string("sessiond.toml").expect("Failed to read sessiond.toml");
            toml::from_str(&content).expect("Failed to parse sessiond.toml")
        } else {
            Config::default()
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("SESSIOND_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(url) = std::env::var("SESSIOND_STORE_URL") {
            config.store.url = url;
        }
        if let Ok(secret) = std::env::var("SESSIOND_TOKEN_SECRET") {
            config.token.secret = secret;
        }

        config.apply_floors();
        config
    }

    fn apply_floors(&mut self) {
        if self.session.timeout_ms < MIN_SESSION_TIMEOUT_MS {
            self.session.timeout_ms = MIN_SESSION_TIMEOUT_MS;
        }
    }
}
