//! Error taxonomy for the session lifecycle core.
//!
//! Every failure a caller can see is a [`SessionError`] variant; raw store or
//! SSH-library errors never cross the manager's boundary. The HTTP mapping
//! lives here too so route handlers can `?` straight through.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::model::SessionKey;

/// Distributed-store failures. Every operation is bounded by a timeout so a
/// dead store cannot hang request threads.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupt store entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failures while establishing an SSH connection. Never retried here —
/// retries belong to the caller.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection to {host}:{port} timed out")]
    Timeout { host: String, port: u16 },
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("remote authentication failed: {0}")]
    Auth(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
}

/// Typed failures surfaced by the lifecycle manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token missing, malformed, badly signed, or expired.
    #[error("invalid or expired session token")]
    Authentication,
    /// Token is valid but no session is behind it (expired or released).
    #[error("session not found or expired")]
    NotFound,
    /// A handle for the session exists but the connection is gone; local and
    /// distributed state were cleaned up before this was returned.
    #[error("session connection is no longer alive")]
    SessionDead,
    /// A non-expired session already exists for this key.
    #[error("an active session already exists for {0}")]
    AlreadyActive(SessionKey),
    #[error("connection establishment failed: {0}")]
    ConnectionFailed(#[from] ConnectError),
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("token generation failed: {0}")]
    Token(String),
}

impl SessionError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::SessionDead => StatusCode::GONE,
            Self::AlreadyActive(_) => StatusCode::CONFLICT,
            Self::ConnectionFailed(_) => StatusCode::BAD_GATEWAY,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication => "AUTH_INVALID_TOKEN",
            Self::NotFound => "SESSION_NOT_FOUND",
            Self::SessionDead => "SESSION_DEAD",
            Self::AlreadyActive(_) => "SESSION_ALREADY_ACTIVE",
            Self::ConnectionFailed(_) => "SSH_CONNECT_FAILED",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Token(_) => "TOKEN_ERROR",
        }
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));
        (self.status(), body).into_response()
    }
}
