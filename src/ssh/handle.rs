//! Connection handle owned by the local registry.

use std::sync::atomic::{AtomicU64, Ordering};

use super::RemoteConnection;
use crate::util::now_ms;

/// Wraps one live remote-shell connection together with local access-time
/// bookkeeping. Exclusively owned by one registry slot on one instance;
/// never serialized, never shared across instances.
///
/// The last-accessed timestamp is an atomic so request threads can refresh it
/// through a shared reference without taking the registry's write lock.
pub struct ConnectionHandle {
    connection: Box<dyn RemoteConnection>,
    last_accessed_ms: AtomicU64,
}

impl ConnectionHandle {
    pub fn new(connection: Box<dyn RemoteConnection>) -> Self {
        Self {
            connection,
            last_accessed_ms: AtomicU64::new(now_ms()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Refresh the last-accessed timestamp to now.
    pub fn touch(&self) {
        self.last_accessed_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn last_accessed_ms(&self) -> u64 {
        self.last_accessed_ms.load(Ordering::Relaxed)
    }

    /// Disconnect the underlying connection. Idempotent; never errors.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    #[cfg(test)]
    pub(crate) fn set_last_accessed_ms(&self, ms: u64) {
        self.last_accessed_ms.store(ms, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    struct FakeConnection {
        connected: Arc<AtomicBool>,
        disconnects: Arc<AtomicU64>,
    }

    #[async_trait]
    impl RemoteConnection for FakeConnection {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn disconnect(&self) {
            if self.connected.swap(false, Ordering::SeqCst) {
                self.disconnects.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn touch_advances_last_accessed() {
        let handle = ConnectionHandle::new(Box::new(FakeConnection {
            connected: Arc::new(AtomicBool::new(true)),
            disconnects: Arc::new(AtomicU64::new(0)),
        }));
        handle.set_last_accessed_ms(1);
        handle.touch();
        assert!(handle.last_accessed_ms() > 1);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let disconnects = Arc::new(AtomicU64::new(0));
        let handle = ConnectionHandle::new(Box::new(FakeConnection {
            connected: Arc::new(AtomicBool::new(true)),
            disconnects: Arc::clone(&disconnects),
        }));
        assert!(handle.is_connected());
        handle.disconnect().await;
        handle.disconnect().await;
        assert!(!handle.is_connected());
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }
}
