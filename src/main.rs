#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # sessiond
//!
//! Distributed SSH session lifecycle service.
//!
//! Each instance of sessiond holds live SSH connections in a process-local
//! registry while session identity, metadata, and token validity live in a
//! shared TTL key-value store — so a fleet of stateless instances can
//! create, renew, and release sessions behind a load balancer without ever
//! leaking an open remote connection or honoring a stale credential.
//!
//! ## API surface
//!
//! | Method | Path                                   | Description                     |
//! |--------|----------------------------------------|---------------------------------|
//! | GET    | `/api/health`                          | Liveness probe                  |
//! | POST   | `/api/lifecycle/ssh/init`              | Open a session, mint a token    |
//! | POST   | `/api/lifecycle/ssh/{token}/keepalive` | Renew TTLs, rotate the token    |
//! | POST   | `/api/lifecycle/ssh/{token}/release`   | Disconnect and forget (204)     |
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap subcommands, router setup, sweep task,
//!                    graceful shutdown
//! config.rs        — TOML + env-var configuration
//! state.rs         — AppState shared with handlers
//! error.rs         — typed failure taxonomy + HTTP mapping
//! token.rs         — HMAC-signed session tokens
//! instance.rs      — process-stable instance identity
//! model.rs         — SessionKey, SessionMetadata, connection parameters
//! store/
//!   mod.rs         — SessionStore seam, store key namespaces
//!   redis.rs       — Redis implementation (bounded-timeout ops, JSON values)
//! ssh/
//!   mod.rs         — connector + connection seams
//!   client.rs      — russh-backed connector (connect, auth, disconnect)
//!   handle.rs      — ConnectionHandle with local access-time bookkeeping
//! sessions/
//!   registry.rs    — process-local SessionKey → handle map
//!   mod.rs         — SessionLifecycleManager (init/keep-alive/release/sweep)
//! routes/
//!   health.rs      — GET /api/health
//!   lifecycle.rs   — the three lifecycle endpoints
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{routing::get, routing::post, Router};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sessiond::ssh::client::RusshConnector;
use sessiond::store::redis::RedisSessionStore;
use sessiond::{AppState, Config, InstanceId, SessionLifecycleManager, TokenIssuer};

/// Distributed SSH session lifecycle service.
#[derive(Parser)]
#[command(name = "sessiond", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default when no subcommand given).
    Serve {
        /// Path to TOML config file.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { config }) => run_server(config.as_deref()).await,
        None => run_server(None).await,
    }
}

async fn run_server(config_path: Option<&str>) {
    let config = Config::load(config_path);

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let instance_id = InstanceId::from_env_or_generate();

    info!("sessiond v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Instance id: {instance_id}");
    info!("Listening on {}", config.server.listen);
    info!("Session timeout: {} ms", config.session.timeout_ms);

    if config.token.secret == "change-me" {
        warn!("Using default token secret — set SESSIOND_TOKEN_SECRET or update config");
    }

    let store = RedisSessionStore::connect(
        &config.store.url,
        Duration::from_millis(config.store.op_timeout_ms),
    )
    .await
    .expect("Failed to connect to session store");

    let connector = RusshConnector::new(Duration::from_millis(config.session.connect_timeout_ms));
    let tokens = TokenIssuer::new(&config.token.secret, config.session.timeout_ms);

    let sessions = SessionLifecycleManager::new(
        Arc::new(store),
        Arc::new(connector),
        tokens,
        instance_id.clone(),
        Duration::from_millis(config.session.timeout_ms),
    );

    let state = AppState {
        config: Arc::new(config),
        start_time: Instant::now(),
        instance_id,
        sessions,
    };

    let app = Router::new()
        .route("/api/health", get(sessiond::routes::health::health))
        .route(
            "/api/lifecycle/ssh/init",
            post(sessiond::routes::lifecycle::init_session),
        )
        .route(
            "/api/lifecycle/ssh/{token}/keepalive",
            post(sessiond::routes::lifecycle::keep_alive),
        )
        .route(
            "/api/lifecycle/ssh/{token}/release",
            post(sessiond::routes::lifecycle::release),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = TcpListener::bind(&state.config.server.listen)
        .await
        .expect("Failed to bind");

    info!("Server ready");

    // Periodic sweep: every instance cleans up its own stale connections.
    let sweep_manager = state.sessions.clone();
    let sweep_interval = Duration::from_millis(state.config.session.sweep_interval_ms);
    let sweep_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await; // first tick fires immediately, skip it
        loop {
            interval.tick().await;
            sweep_manager.cleanup_expired_sessions().await;
        }
    });

    // Graceful shutdown
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to register SIGTERM");
            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("Received SIGINT");
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Server error");

    // Cleanup
    info!("Shutting down...");
    sweep_task.abort();
    state.sessions.drain().await;
    info!("Goodbye");
}
