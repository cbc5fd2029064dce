//! Redis-backed session store.
//!
//! Values are JSON; TTLs use `SET ... EX`. Every call runs under
//! `tokio::time::timeout` so a partitioned or overloaded Redis surfaces as
//! [`StoreError::Timeout`] within a bounded delay instead of a hung request.
//! The [`ConnectionManager`] reconnects on its own after transient failures.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;
use tracing::info;

use super::{metadata_store_key, token_store_key, SessionStore};
use crate::error::StoreError;
use crate::model::{SessionKey, SessionMetadata};

/// Bound on the initial connection handshake at startup.
const INITIAL_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RedisSessionStore {
    connection: ConnectionManager,
    op_timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to Redis at `url`. `op_timeout` bounds every subsequent store
    /// operation.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = timeout(INITIAL_CONNECT_TIMEOUT, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(INITIAL_CONNECT_TIMEOUT))??;
        info!("Connected to session store at {url}");
        Ok(Self {
            connection,
            op_timeout,
        })
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        store_key: String,
        value: &T,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(value)?;
        let ttl_secs = ttl.as_secs().max(1);
        let mut connection = self.connection.clone();
        timeout(
            self.op_timeout,
            connection.set_ex::<_, _, ()>(store_key, payload, ttl_secs),
        )
        .await
        .map_err(|_| StoreError::Timeout(self.op_timeout))??;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        store_key: String,
    ) -> Result<Option<T>, StoreError> {
        let mut connection = self.connection.clone();
        let payload: Option<String> = timeout(self.op_timeout, connection.get(store_key))
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))??;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, store_key: String) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        timeout(self.op_timeout, connection.del::<_, ()>(store_key))
            .await
            .map_err(|_| StoreError::Timeout(self.op_timeout))??;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put_token(
        &self,
        token: &str,
        key: &SessionKey,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.set_json(token_store_key(token), key, ttl).await
    }

    async fn get_token(&self, token: &str) -> Result<Option<SessionKey>, StoreError> {
        self.get_json(token_store_key(token)).await
    }

    async fn delete_token(&self, token: &str) -> Result<(), StoreError> {
        self.delete(token_store_key(token)).await
    }

    async fn put_metadata(
        &self,
        key: &SessionKey,
        metadata: &SessionMetadata,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.set_json(metadata_store_key(key), metadata, ttl).await
    }

    async fn get_metadata(&self, key: &SessionKey) -> Result<Option<SessionMetadata>, StoreError> {
        self.get_json(metadata_store_key(key)).await
    }

    async fn delete_metadata(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.delete(metadata_store_key(key)).await
    }
}
