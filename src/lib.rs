#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::unused_async)]

//! sessiond library — distributed SSH session lifecycle management.
//!
//! Building blocks:
//! - `sessions` — the lifecycle manager and the local connection registry
//! - `ssh` — connector seam and connection handles (russh-backed)
//! - `store` — distributed TTL'd session store (Redis-backed)
//! - `token` — signed session token minting and validation
//! - `config` — TOML + env-var configuration
//! - `routes` — REST API route handlers
//! - `error` — the typed failure taxonomy crossing the manager boundary

pub mod config;
pub mod error;
pub mod instance;
pub mod model;
pub mod routes;
pub mod sessions;
pub mod ssh;
pub mod state;
pub mod store;
pub mod token;
pub mod util;

// Re-export key types at crate root for convenience.
pub use config::Config;
pub use error::SessionError;
pub use instance::InstanceId;
pub use model::{SessionKey, SessionMetadata};
pub use sessions::SessionLifecycleManager;
pub use state::AppState;
pub use token::TokenIssuer;
