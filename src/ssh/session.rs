//! SSH sessions
//!
//! [`Connector`] opens authenticated sessions and [`RemoteSession`] is what
//! a [`Credential`](crate::credential::Credential) owns afterwards. The russh
//! implementations are [`RusshConnector`] and [`RusshSession`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};
use russh::Disconnect;
use tokio::time::timeout;
use tracing::{debug, error, info};

use super::command::{exec_on, CommandOutput};
use super::config::SshConfig;
use super::handler::SshHandler;
use super::transfer;
use crate::error::{AutolinuxError, Result};

/// An authenticated connection to a remote host
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Run a command and wait for it to finish
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Copy a remote file to a local path
    async fn download(&self, remote: &str, local: &Path) -> Result<()>;

    /// Copy a local file to a remote path
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    /// Disconnect. Later calls are no-ops.
    async fn close(&self) -> Result<()>;
}

/// Opens sessions for a username with one authentication method
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open_with_key(
        &self,
        target: &SshConfig,
        username: &str,
        key: Arc<PrivateKey>,
    ) -> Result<Box<dyn RemoteSession>>;

    async fn open_with_password(
        &self,
        target: &SshConfig,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteSession>>;
}

/// Connector backed by russh
#[derive(Debug, Clone, Default)]
pub struct RusshConnector;

impl RusshConnector {
    async fn handshake(target: &SshConfig) -> Result<Handle<SshHandler>> {
        info!("Connecting to SSH server {}...", target.address());

        let ssh_config = Arc::new(client::Config::default());
        let connect = client::connect(
            ssh_config,
            (target.host.as_str(), target.port),
            SshHandler::new(target),
        );

        let connect_result = match target.connect_timeout {
            Some(limit) => match timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => {
                    error!("SSH connection timeout after {:?}", limit);
                    return Err(AutolinuxError::connection(format!(
                        "Connection timeout after {:?}",
                        limit
                    )));
                }
            },
            None => connect.await,
        };

        connect_result.map_err(|e| {
            error!("SSH connection to {} failed: {}", target.address(), e);
            AutolinuxError::connection(e.to_string())
        })
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn open_with_key(
        &self,
        target: &SshConfig,
        username: &str,
        key: Arc<PrivateKey>,
    ) -> Result<Box<dyn RemoteSession>> {
        let mut handle = Self::handshake(target).await?;

        debug!("Attempting key authentication for user '{}'", username);

        // RSA keys need the strongest hash both sides support
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(|e| AutolinuxError::auth(e.to_string()))?
            .flatten();

        let auth_result = handle
            .authenticate_publickey(username, PrivateKeyWithHashAlg::new(key, hash_alg))
            .await
            .map_err(|e| AutolinuxError::auth(e.to_string()))?;

        if !auth_result.success() {
            return Err(AutolinuxError::auth("Key authentication rejected"));
        }

        info!("Key authentication successful");
        Ok(Box::new(RusshSession::new(handle, target)))
    }

    async fn open_with_password(
        &self,
        target: &SshConfig,
        username: &str,
        password: &str,
    ) -> Result<Box<dyn RemoteSession>> {
        let mut handle = Self::handshake(target).await?;

        debug!("Attempting password authentication for user '{}'", username);

        let auth_result = handle
            .authenticate_password(username, password)
            .await
            .map_err(|e| AutolinuxError::auth(e.to_string()))?;

        if !auth_result.success() {
            return Err(AutolinuxError::auth("Password authentication rejected"));
        }

        info!("Password authentication successful");
        Ok(Box::new(RusshSession::new(handle, target)))
    }
}

/// Session backed by a russh client handle
pub struct RusshSession {
    handle: Handle<SshHandler>,
    address: String,
}

impl RusshSession {
    fn new(handle: Handle<SshHandler>, target: &SshConfig) -> Self {
        Self {
            handle,
            address: target.address(),
        }
    }
}

#[async_trait]
impl RemoteSession for RusshSession {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        debug!("Executing on {}: {}", self.address, command);
        exec_on(&self.handle, command).await
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        transfer::download(&self.handle, remote, local).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        transfer::upload(&self.handle, local, remote).await
    }

    async fn close(&self) -> Result<()> {
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| AutolinuxError::connection(e.to_string()))?;
        info!("SSH connection to {} closed", self.address);
        Ok(())
    }
}

impl std::fmt::Debug for RusshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshSession")
            .field("address", &self.address)
            .field("closed", &self.handle.is_closed())
            .finish()
    }
}
