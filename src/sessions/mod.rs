//! Session lifecycle management across a fleet of stateless instances.
//!
//! [`SessionLifecycleManager`] reconciles three sources of truth:
//!
//! - the process-local [`ConnectionRegistry`] holding live SSH connections,
//! - the distributed store's session metadata (fleet-visible, TTL'd),
//! - the distributed store's token → session-key index.
//!
//! Only the instance recorded in `hosting_instance_id` can drive the live
//! connection; every instance can validate tokens and read/write metadata.
//! A keep-alive that lands on a non-hosting instance renews TTLs on trust of
//! the hosting instance's ownership and performs no local liveness check.
//!
//! ## Concurrency
//!
//! The registry lock is never held across a store await. Per-key operations
//! are not serialized across the fleet: concurrent renewals race and the last
//! writer wins, which is acceptable because every rewrite is derived from the
//! same key and the token's signed expiry backstops staleness.

pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SessionError, StoreError};
use crate::instance::InstanceId;
use crate::model::{ConnectionParams, SessionKey, SessionMetadata, SESSION_KIND_SSH};
use crate::ssh::{ConnectionHandle, RemoteShellConnector};
use crate::store::SessionStore;
use crate::token::TokenIssuer;
use crate::util::{now_ms, token_prefix};
use registry::ConnectionRegistry;

/// Result of a successful session init.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub token: String,
    pub issued_at_ms: u64,
    pub expires_at_ms: u64,
}

/// Result of a successful keep-alive.
#[derive(Debug, Clone)]
pub struct KeepAlive {
    pub session_token: String,
    pub status: SessionStatus,
    pub expires_at_ms: u64,
}

/// Externally visible session state. Every successful lifecycle operation
/// reports `Active`; terminal states surface as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
        }
    }
}

/// Orchestrates session creation, renewal, lookup, release, and expiry
/// sweeps.
///
/// Cloneable — all clones share the same registry and collaborators.
#[derive(Clone)]
pub struct SessionLifecycleManager {
    pub(crate) registry: ConnectionRegistry,
    store: Arc<dyn SessionStore>,
    connector: Arc<dyn RemoteShellConnector>,
    tokens: TokenIssuer,
    instance_id: InstanceId,
    session_timeout: Duration,
}

impl SessionLifecycleManager {
    pub fn new(
        store: Arc<dyn SessionStore>,
        connector: Arc<dyn RemoteShellConnector>,
        tokens: TokenIssuer,
        instance_id: InstanceId,
        session_timeout: Duration,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            store,
            connector,
            tokens,
            instance_id,
            session_timeout,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn session_timeout_ms(&self) -> u64 {
        self.session_timeout.as_millis() as u64
    }

    /// Open a new SSH session for `(owner_user_id, resource_id)`.
    ///
    /// Rejects creation while a non-expired session already exists for the
    /// key; stale leftover metadata is cleaned up first. On connect failure
    /// nothing is registered and nothing is written. On store-write failure
    /// the fresh connection is torn down again — no leaked connections, no
    /// partial state.
    pub async fn init_session(
        &self,
        owner_user_id: Uuid,
        resource_id: Uuid,
        params: ConnectionParams,
    ) -> Result<SessionTicket, SessionError> {
        let key = SessionKey::ssh(owner_user_id, resource_id);
        info!("Initializing SSH session for {key}");

        match self.store.get_metadata(&key).await {
            Ok(Some(existing)) if !existing.is_expired(now_ms()) => {
                warn!("Rejecting duplicate session init for {key}");
                return Err(SessionError::AlreadyActive(key));
            }
            Ok(Some(_)) => {
                debug!("Sweeping stale metadata for {key} before init");
                self.force_release_by_key(&key, None).await.ok();
            }
            Ok(None) => {}
            Err(e) => return Err(e.into()),
        }

        let connection = self.connector.connect(&params).await?;
        let handle = Arc::new(ConnectionHandle::new(connection));

        if let Some(displaced) = self
            .registry
            .insert(key.clone(), Arc::clone(&handle))
            .await
        {
            // Lost a race with a concurrent init for the same key.
            warn!("Displacing concurrently created handle for {key}");
            displaced.disconnect().await;
        }

        let issued = self.tokens.generate(&key)?;
        let metadata = SessionMetadata {
            session_key: key.clone(),
            issued_at_ms: issued.issued_at_ms,
            last_accessed_ms: issued.issued_at_ms,
            expires_at_ms: issued.expires_at_ms,
            hosting_instance_id: self.instance_id.as_str().to_string(),
            target_host: params.host.clone(),
            target_username: params.username.clone(),
            current_token: issued.token.clone(),
        };

        let write = async {
            self.store
                .put_token(&issued.token, &key, self.session_timeout)
                .await?;
            self.store
                .put_metadata(&key, &metadata, self.session_timeout)
                .await
        };
        if let Err(e) = write.await {
            warn!("Store write failed during init for {key}, rolling back: {e}");
            if let Some(h) = self.registry.remove(&key).await {
                h.disconnect().await;
            }
            self.store.delete_token(&issued.token).await.ok();
            self.store.delete_metadata(&key).await.ok();
            return Err(e.into());
        }

        info!(
            "SSH session initialized for {key}, token {}…",
            token_prefix(&issued.token)
        );
        Ok(SessionTicket {
            token: issued.token,
            issued_at_ms: issued.issued_at_ms,
            expires_at_ms: issued.expires_at_ms,
        })
    }

    /// Renew a session: prove liveness (where possible), extend both store
    /// TTLs, and rotate the token. The old token mapping is deleted once the
    /// new one is written.
    pub async fn keep_alive_session(&self, token: &str) -> Result<KeepAlive, SessionError> {
        let claims = self
            .tokens
            .claims(token)
            .ok_or(SessionError::Authentication)?;
        if claims.kind != SESSION_KIND_SSH {
            warn!("Keep-alive with non-SSH token kind {}", claims.kind);
            return Err(SessionError::Authentication);
        }

        // Read path fails closed: an unreachable store must not extend access.
        let key = match self.store.get_token(token).await {
            Ok(Some(key)) => key,
            Ok(None) => return Err(SessionError::NotFound),
            Err(e) => {
                warn!(
                    "Store unreachable resolving token {}…, failing closed: {e}",
                    token_prefix(token)
                );
                return Err(SessionError::NotFound);
            }
        };

        let mut locally_live = false;
        if let Some(handle) = self.registry.get(&key).await {
            if handle.is_connected() {
                handle.touch();
                locally_live = true;
            } else {
                // Dead local handle: clean up both sides, do not renew.
                info!("Local connection for {key} is dead, cleaning up");
                self.force_release_by_key(&key, Some(token)).await.ok();
                return Err(SessionError::SessionDead);
            }
        }

        let current = match self.store.get_metadata(&key).await {
            Ok(current) => current,
            Err(e) => {
                warn!("Store unreachable reading metadata for {key}: {e}");
                None
            }
        };

        if !locally_live {
            match &current {
                None => return Err(SessionError::NotFound),
                Some(m) if m.is_expired(now_ms()) => {
                    self.force_release_by_key(&key, Some(token)).await.ok();
                    return Err(SessionError::NotFound);
                }
                Some(m) if m.hosting_instance_id == self.instance_id.as_str() => {
                    // Metadata names this instance but the handle is gone
                    // (restart wiped the registry). Handles never migrate,
                    // so the session cannot recover.
                    info!("Metadata for {key} names this instance but no handle exists");
                    self.force_release_by_key(&key, Some(token)).await.ok();
                    return Err(SessionError::SessionDead);
                }
                Some(m) => {
                    debug!(
                        "Keep-alive for {key} hosted on {}, extending TTL on trust",
                        m.hosting_instance_id
                    );
                }
            }
        }

        let issued = self.tokens.generate(&key)?;
        let metadata = SessionMetadata {
            session_key: key.clone(),
            issued_at_ms: current.as_ref().map_or(issued.issued_at_ms, |m| m.issued_at_ms),
            last_accessed_ms: issued.issued_at_ms,
            expires_at_ms: issued.expires_at_ms,
            hosting_instance_id: current.as_ref().map_or_else(
                || self.instance_id.as_str().to_string(),
                |m| m.hosting_instance_id.clone(),
            ),
            target_host: current
                .as_ref()
                .map(|m| m.target_host.clone())
                .unwrap_or_default(),
            target_username: current
                .as_ref()
                .map(|m| m.target_username.clone())
                .unwrap_or_default(),
            current_token: issued.token.clone(),
        };

        // Renewal writes must surface store failures, not mask them.
        self.store
            .put_token(&issued.token, &key, self.session_timeout)
            .await?;
        self.store
            .put_metadata(&key, &metadata, self.session_timeout)
            .await?;
        if token != issued.token {
            self.store.delete_token(token).await.ok();
        }

        debug!(
            "Keep-alive for {key}: new token {}…, expires {}",
            token_prefix(&issued.token),
            issued.expires_at_ms
        );
        Ok(KeepAlive {
            session_token: issued.token,
            status: SessionStatus::Active,
            expires_at_ms: issued.expires_at_ms,
        })
    }

    /// Release the session named by `token`. Idempotent: an invalid token or
    /// one with no session behind it is a no-op success. Any instance may
    /// release any session it can authenticate against.
    pub async fn release_session(&self, token: &str) -> Result<(), SessionError> {
        if self.tokens.claims(token).is_none() {
            warn!("Release with invalid token {}…", token_prefix(token));
            return Ok(());
        }
        let key = match self.store.get_token(token).await {
            Ok(Some(key)) => key,
            Ok(None) => {
                debug!("No session behind token {}…", token_prefix(token));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        self.force_release_by_key(&key, Some(token)).await?;
        info!("SSH session released for {key}");
        Ok(())
    }

    /// Live handle for `key` on *this* instance. Pure lookup, no side effects.
    pub async fn get_local_session(&self, key: &SessionKey) -> Option<Arc<ConnectionHandle>> {
        self.registry.get(key).await
    }

    /// Fleet-visible metadata for `key`. Entries past their expiry read as
    /// absent even if the store has not aged them out yet.
    pub async fn get_session_metadata(
        &self,
        key: &SessionKey,
    ) -> Result<Option<SessionMetadata>, SessionError> {
        let metadata = self.store.get_metadata(key).await?;
        Ok(metadata.filter(|m| !m.is_expired(now_ms())))
    }

    /// Number of live connections hosted by this instance.
    pub async fn local_session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Periodic sweep of this instance's own connections. Staleness is judged
    /// by *local* access time, so an instance cleans up its own dead weight
    /// even when the distributed metadata was already cleared by someone
    /// else. Handles owned by other instances are never touched.
    ///
    /// Returns the number of connections released.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let entries = self.registry.snapshot().await;
        if entries.is_empty() {
            return 0;
        }

        let now = now_ms();
        let timeout_ms = self.session_timeout_ms();
        let mut released = 0;

        for (key, handle) in entries {
            let idle_ms = now.saturating_sub(handle.last_accessed_ms());
            if handle.is_connected() && idle_ms <= timeout_ms {
                continue;
            }
            if handle.is_connected() {
                info!("Local session {key} idle for {idle_ms} ms, releasing");
            } else {
                info!("Local session {key} is disconnected, releasing");
            }

            if let Some(h) = self.registry.remove(&key).await {
                h.disconnect().await;
            }

            // Best-effort store cleanup, only while the metadata still names
            // this instance — another instance may own a newer session.
            match self.store.get_metadata(&key).await {
                Ok(Some(m)) if m.hosting_instance_id == self.instance_id.as_str() => {
                    self.store.delete_metadata(&key).await.ok();
                    self.store.delete_token(&m.current_token).await.ok();
                }
                Ok(_) => {}
                Err(e) => warn!("Store unreachable during sweep of {key}: {e}"),
            }
            released += 1;
        }

        if released > 0 {
            info!("Sweep released {released} local session(s)");
        }
        released
    }

    /// Drain every local connection at shutdown: disconnect handles and
    /// best-effort delete store entries that still name this instance.
    pub async fn drain(&self) {
        let entries = self.registry.drain().await;
        let count = entries.len();
        for (key, handle) in entries {
            handle.disconnect().await;
            match self.store.get_metadata(&key).await {
                Ok(Some(m)) if m.hosting_instance_id == self.instance_id.as_str() => {
                    self.store.delete_metadata(&key).await.ok();
                    self.store.delete_token(&m.current_token).await.ok();
                }
                Ok(_) => {}
                Err(e) => warn!("Store unreachable draining {key}: {e}"),
            }
        }
        if count > 0 {
            info!("Drained {count} local session(s)");
        }
    }

    /// Tear down everything recorded for `key`: the local handle (if any),
    /// the metadata entry, and the token mappings — both the one recorded in
    /// metadata and, when it differs, the one the caller presented.
    async fn force_release_by_key(
        &self,
        key: &SessionKey,
        presented_token: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(handle) = self.registry.remove(key).await {
            handle.disconnect().await;
            debug!("Closed local connection for {key}");
        }

        let recorded_token = match self.store.get_metadata(key).await {
            Ok(meta) => meta.map(|m| m.current_token),
            Err(e) => {
                warn!("Store unreachable reading metadata for release of {key}: {e}");
                None
            }
        };

        let mut result = self.store.delete_metadata(key).await;
        if let Some(ref token) = recorded_token {
            if let Err(e) = self.store.delete_token(token).await {
                result = result.and(Err(e));
            }
        }
        if let Some(token) = presented_token {
            if recorded_token.as_deref() != Some(token) {
                if let Err(e) = self.store.delete_token(token).await {
                    result = result.and(Err(e));
                }
            }
        }
        result
    }
}
