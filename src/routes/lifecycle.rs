//! REST endpoints for the SSH session lifecycle.
//!
//! - `POST /api/lifecycle/ssh/init`               — open a session, mint a token
//! - `POST /api/lifecycle/ssh/{token}/keepalive`  — renew TTLs, rotate the token
//! - `POST /api/lifecycle/ssh/{token}/release`    — disconnect and forget

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::model::{ConnectionParams, Credential, SESSION_KIND_SSH};
use crate::sessions::SessionStatus;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InitSessionRequest {
    pub owner_user_id: Uuid,
    pub server_id: Uuid,
    pub connection: ConnectionDetails,
}

/// Connection details as provided by the caller. Credential material arrives
/// already decrypted; exactly one of `password` / `private_key` is required.
#[derive(Deserialize)]
pub struct ConnectionDetails {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

impl ConnectionDetails {
    fn into_params(self) -> Result<ConnectionParams, &'static str> {
        let credential = match (self.password, self.private_key) {
            (Some(password), None) => Credential::Password(password),
            (None, Some(pem)) => Credential::PrivateKey {
                pem,
                passphrase: self.passphrase,
            },
            (Some(_), Some(_)) => return Err("provide either password or private_key, not both"),
            (None, None) => return Err("either password or private_key is required"),
        };
        Ok(ConnectionParams {
            host: self.host,
            port: self.port,
            username: self.username,
            credential,
        })
    }
}

/// `POST /api/lifecycle/ssh/init` — open a new SSH session.
pub async fn init_session(
    State(state): State<AppState>,
    Json(request): Json<InitSessionRequest>,
) -> Response {
    let params = match request.connection.into_params() {
        Ok(params) => params,
        Err(message) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": message, "code": "INVALID_REQUEST"})),
            )
                .into_response();
        }
    };

    match state
        .sessions
        .init_session(request.owner_user_id, request.server_id, params)
        .await
    {
        Ok(ticket) => (
            StatusCode::CREATED,
            Json(json!({
                "session_token": ticket.token,
                "session_type": SESSION_KIND_SSH,
                "status": SessionStatus::Active.as_str(),
                "created_at": ticket.issued_at_ms,
                "expires_at": ticket.expires_at_ms,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /api/lifecycle/ssh/{token}/keepalive` — renew a session.
pub async fn keep_alive(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.sessions.keep_alive_session(&token).await {
        Ok(renewed) => Json(json!({
            "session_token": renewed.session_token,
            "status": renewed.status.as_str(),
            "expires_at": renewed.expires_at_ms,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `POST /api/lifecycle/ssh/{token}/release` — release a session. Idempotent;
/// releasing an unknown or already-released token still returns 204.
pub async fn release(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.sessions.release_session(&token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
