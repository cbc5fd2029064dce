//! Distributed session store.
//!
//! The fleet shares one TTL'd key-value store holding two logical
//! namespaces, each serialized independently:
//!
//! - `session:ssh:token:<token>` → [`SessionKey`] — resolves a presented
//!   bearer token to the session it names.
//! - `session:ssh:metadata:<owner>:<resource>:<kind>` → [`SessionMetadata`] —
//!   the fleet-visible session record.
//!
//! There are no cross-key transactions: the two entries are written and
//! deleted together best-effort, with per-key atomicity only. The token's own
//! signed expiry is the backstop for any inconsistency window.
//!
//! [`SessionStore`] is the seam: production uses [`redis::RedisSessionStore`];
//! tests substitute an in-memory double.

pub mod redis;

#[cfg(test)]
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{SessionKey, SessionMetadata};

/// Store key for the token → session-key mapping.
pub fn token_store_key(token: &str) -> String {
    format!("session:ssh:token:{token}")
}

/// Store key for the session-key → metadata mapping.
pub fn metadata_store_key(key: &SessionKey) -> String {
    format!(
        "session:ssh:metadata:{}:{}:{}",
        key.owner_user_id, key.resource_id, key.kind
    )
}

/// Network key-value store with per-key TTL. Implementations bound every
/// operation with a timeout; a dead store must never hang a request thread.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put_token(
        &self,
        token: &str,
        key: &SessionKey,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get_token(&self, token: &str) -> Result<Option<SessionKey>, StoreError>;

    async fn delete_token(&self, token: &str) -> Result<(), StoreError>;

    async fn put_metadata(
        &self,
        key: &SessionKey,
        metadata: &SessionMetadata,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn get_metadata(&self, key: &SessionKey) -> Result<Option<SessionMetadata>, StoreError>;

    async fn delete_metadata(&self, key: &SessionKey) -> Result<(), StoreError>;
}
