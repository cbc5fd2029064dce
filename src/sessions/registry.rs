//! Process-local connection registry.
//!
//! Maps [`SessionKey`] to the live [`ConnectionHandle`] hosted by *this*
//! instance. The map is behind an `RwLock`; lock scopes cover only the map
//! operation itself — callers never hold the lock across a store await or a
//! disconnect.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::SessionKey;
use crate::ssh::ConnectionHandle;

/// Concurrent map of this instance's live connections.
///
/// Cloneable — all clones share the same inner `Arc<RwLock<...>>`.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<SessionKey, Arc<ConnectionHandle>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, returning the displaced one if the key was taken.
    pub async fn insert(
        &self,
        key: SessionKey,
        handle: Arc<ConnectionHandle>,
    ) -> Option<Arc<ConnectionHandle>> {
        self.inner.write().await.insert(key, handle)
    }

    pub async fn get(&self, key: &SessionKey) -> Option<Arc<ConnectionHandle>> {
        self.inner.read().await.get(key).map(Arc::clone)
    }

    pub async fn remove(&self, key: &SessionKey) -> Option<Arc<ConnectionHandle>> {
        self.inner.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Snapshot of all entries, for sweeps. Handles are `Arc`s, so entries
    /// removed concurrently stay valid in the snapshot.
    pub async fn snapshot(&self) -> Vec<(SessionKey, Arc<ConnectionHandle>)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(k, h)| (k.clone(), Arc::clone(h)))
            .collect()
    }

    /// Remove and return every entry. Used by the shutdown drain.
    pub async fn drain(&self) -> Vec<(SessionKey, Arc<ConnectionHandle>)> {
        self.inner.write().await.drain().collect()
    }
}
