//! Core session data model.
//!
//! [`SessionKey`] is the identity tuple used as the lookup key everywhere:
//! the local connection registry, both distributed-store namespaces, and
//! token claims. [`SessionMetadata`] is the store-resident record describing
//! a session to the rest of the fleet; it never holds the connection itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminator for interactive remote-shell sessions.
pub const SESSION_KIND_SSH: &str = "SSH";

/// Identity of one logical session: who owns it, what it connects to, and
/// what kind of session it is. Equality and hashing are structural over all
/// three fields; never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub owner_user_id: Uuid,
    pub resource_id: Uuid,
    pub kind: String,
}

impl SessionKey {
    /// Key for an SSH session owned by `owner_user_id` against `resource_id`.
    pub fn ssh(owner_user_id: Uuid, resource_id: Uuid) -> Self {
        Self {
            owner_user_id,
            resource_id,
            kind: SESSION_KIND_SSH.to_string(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.owner_user_id, self.resource_id, self.kind
        )
    }
}

/// Fleet-visible description of a session, stored exclusively in the
/// distributed store. Rewritten on every keep-alive (fresh expiry, fresh
/// token, refreshed access time), deleted on release or expiry sweep.
///
/// `hosting_instance_id` records which instance holds the live connection;
/// other instances use it to tell whether a handle is reachable locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_key: SessionKey,
    pub issued_at_ms: u64,
    pub last_accessed_ms: u64,
    pub expires_at_ms: u64,
    pub hosting_instance_id: String,
    pub target_host: String,
    pub target_username: String,
    pub current_token: String,
}

impl SessionMetadata {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Credential material for connecting to the remote host. Arrives already
/// decrypted; this service never persists it.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    PrivateKey {
        /// PEM-encoded private key.
        pem: String,
        /// Passphrase for encrypted keys.
        passphrase: Option<String>,
    },
}

/// Everything needed to open one SSH connection.
#[derive(Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
}

// Hand-written so credential material can never leak through `{:?}` logging.
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field(
                "credential",
                &match self.credential {
                    Credential::Password(_) => "password <redacted>",
                    Credential::PrivateKey { .. } => "private key <redacted>",
                },
            )
            .finish()
    }
}
