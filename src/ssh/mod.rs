//! SSH connectivity: the connector seam and the connection handle.
//!
//! [`RemoteShellConnector`] is the only way connections come into existence;
//! [`RemoteConnection`] is the narrow view the lifecycle layer needs over a
//! live connection (liveness probe + disconnect). Production wires
//! [`client::RusshConnector`]; tests substitute scriptable fakes.

pub mod client;
pub mod handle;

pub use handle::ConnectionHandle;

use async_trait::async_trait;

use crate::error::ConnectError;
use crate::model::ConnectionParams;

/// One live remote-shell connection, as seen by the lifecycle layer.
#[async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Whether the underlying transport still considers itself connected.
    fn is_connected(&self) -> bool;

    /// Tear the connection down. Idempotent: disconnecting an already-closed
    /// connection is a no-op and never errors.
    async fn disconnect(&self);
}

/// Opens remote-shell connections. Establishment is a blocking network call
/// bounded by the configured connect timeout; failures are surfaced, never
/// retried here.
#[async_trait]
pub trait RemoteShellConnector: Send + Sync {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn RemoteConnection>, ConnectError>;
}
