//! russh-backed connector.
//!
//! Opens a TCP connection, runs the SSH handshake, and authenticates with a
//! password or a PEM private key. The whole sequence is bounded by the
//! configured connect timeout. Host keys are currently accepted without
//! verification (the fleet connects to user-registered hosts; pinning is a
//! separate concern).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, AuthResult, Handle};
use russh::keys::{decode_secret_key, PrivateKeyWithHashAlg};
use russh::Disconnect;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{RemoteConnection, RemoteShellConnector};
use crate::error::ConnectError;
use crate::model::{ConnectionParams, Credential};

/// Interval for transport-level keepalive probes to the remote host.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Client event handler. Accepts all host keys.
struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// A live russh client session.
pub struct RusshConnection {
    handle: Handle<ClientHandler>,
}

#[async_trait]
impl RemoteConnection for RusshConnection {
    fn is_connected(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn disconnect(&self) {
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "session released", "en")
            .await
        {
            debug!("Disconnect of already-closing session: {e}");
        }
    }
}

/// Production connector using the russh client.
pub struct RusshConnector {
    connect_timeout: Duration,
}

impl RusshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect_and_auth(
        &self,
        params: &ConnectionParams,
    ) -> Result<Handle<ClientHandler>, ConnectError> {
        let config = Arc::new(client::Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..client::Config::default()
        });

        let addr = (params.host.as_str(), params.port);
        let mut handle = client::connect(config, addr, ClientHandler)
            .await
            .map_err(|e| ConnectError::Connection(e.to_string()))?;

        debug!(
            "Transport established to {}:{}, authenticating as {}",
            params.host, params.port, params.username
        );

        let auth_result = match &params.credential {
            Credential::Password(password) => handle
                .authenticate_password(&params.username, password)
                .await
                .map_err(|e| ConnectError::Auth(e.to_string()))?,
            Credential::PrivateKey { pem, passphrase } => {
                let key = decode_secret_key(pem, passphrase.as_deref())
                    .map_err(|e| ConnectError::InvalidKey(e.to_string()))?;
                let key = PrivateKeyWithHashAlg::new(Arc::new(key), None);
                handle
                    .authenticate_publickey(&params.username, key)
                    .await
                    .map_err(|e| ConnectError::Auth(e.to_string()))?
            }
        };

        match auth_result {
            AuthResult::Success => Ok(handle),
            AuthResult::Failure {
                remaining_methods, ..
            } => Err(ConnectError::Auth(format!(
                "rejected by remote host, remaining methods: {remaining_methods:?}"
            ))),
        }
    }
}

#[async_trait]
impl RemoteShellConnector for RusshConnector {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn RemoteConnection>, ConnectError> {
        let handle = timeout(self.connect_timeout, self.connect_and_auth(params))
            .await
            .map_err(|_| {
                warn!(
                    "SSH connect to {}:{} timed out after {:?}",
                    params.host, params.port, self.connect_timeout
                );
                ConnectError::Timeout {
                    host: params.host.clone(),
                    port: params.port,
                }
            })??;

        info!(
            "SSH connection established to {}:{} as {}",
            params.host, params.port, params.username
        );
        Ok(Box::new(RusshConnection { handle }))
    }
}
