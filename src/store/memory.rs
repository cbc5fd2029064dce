//! In-memory store double for tests.
//!
//! Honors TTLs against the wall clock and can be switched into failure modes
//! to exercise store-unavailable paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{metadata_store_key, token_store_key, SessionStore};
use crate::error::StoreError;
use crate::model::{SessionKey, SessionMetadata};
use crate::util::now_ms;

#[derive(Default)]
pub struct MemorySessionStore {
    tokens: RwLock<HashMap<String, (SessionKey, u64)>>,
    metadata: RwLock<HashMap<String, (SessionMetadata, u64)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail with a timeout error.
    pub fn fail_reads(&self, enabled: bool) {
        self.fail_reads.store(enabled, Ordering::SeqCst);
    }

    /// Make every subsequent write/delete fail with a timeout error.
    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn metadata_count(&self) -> usize {
        self.metadata.read().await.len()
    }

    fn check(&self, flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(Duration::from_millis(1)));
        }
        Ok(())
    }

    fn expires_at(ttl: Duration) -> u64 {
        #[allow(clippy::cast_possible_truncation)]
        let ttl_ms = ttl.as_millis() as u64;
        now_ms() + ttl_ms
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put_token(
        &self,
        token: &str,
        key: &SessionKey,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.tokens
            .write()
            .await
            .insert(token_store_key(token), (key.clone(), Self::expires_at(ttl)));
        Ok(())
    }

    async fn get_token(&self, token: &str) -> Result<Option<SessionKey>, StoreError> {
        self.check(&self.fail_reads)?;
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(&token_store_key(token))
            .filter(|(_, expires_at)| *expires_at > now_ms())
            .map(|(key, _)| key.clone()))
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.tokens.write().await.remove(&token_store_key(token));
        Ok(())
    }

    async fn put_metadata(
        &self,
        key: &SessionKey,
        metadata: &SessionMetadata,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.metadata.write().await.insert(
            metadata_store_key(key),
            (metadata.clone(), Self::expires_at(ttl)),
        );
        Ok(())
    }

    async fn get_metadata(&self, key: &SessionKey) -> Result<Option<SessionMetadata>, StoreError> {
        self.check(&self.fail_reads)?;
        let metadata = self.metadata.read().await;
        Ok(metadata
            .get(&metadata_store_key(key))
            .filter(|(_, expires_at)| *expires_at > now_ms())
            .map(|(value, _)| value.clone()))
    }

    async fn delete_metadata(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.check(&self.fail_writes)?;
        self.metadata
            .write()
            .await
            .remove(&metadata_store_key(key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn key() -> SessionKey {
        SessionKey::ssh(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn round_trips_token_mapping() {
        let store = MemorySessionStore::new();
        let key = key();
        store
            .put_token("tok", &key, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get_token("tok").await.unwrap(), Some(key));
        store.delete_token("tok").await.unwrap();
        assert_eq!(store.get_token("tok").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = MemorySessionStore::new();
        store
            .put_token("tok", &key(), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.get_token("tok").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failure_modes_surface_as_errors() {
        let store = MemorySessionStore::new();
        store.fail_reads(true);
        assert!(store.get_token("tok").await.is_err());
        store.fail_reads(false);
        store.fail_writes(true);
        assert!(store
            .put_token("tok", &key(), Duration::from_secs(1))
            .await
            .is_err());
    }
}
