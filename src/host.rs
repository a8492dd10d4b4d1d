//! Remote host endpoint

use tracing::{debug, warn};

use crate::credential::Credential;
use crate::error::{AutolinuxError, Result};
use crate::ssh::{SshConfig, STDOUT};

/// Command used by [`Host::test`]
pub const PROBE_COMMAND: &str = "uname -a";

/// A remote host, optionally paired with the credential used to reach it
#[derive(Debug)]
pub struct Host {
    target: SshConfig,
    credential: Option<Credential>,
}

impl Host {
    /// Host on port 22 with the default host key policy, no credential
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_target(SshConfig::new(address))
    }

    pub fn with_target(target: SshConfig) -> Self {
        Self {
            target,
            credential: None,
        }
    }

    /// Attach `credential` and connect right away.
    ///
    /// The host is returned even if the login fails; the outcome is on
    /// [`Credential::status`].
    pub async fn connect_and_attach(address: impl Into<String>, credential: Credential) -> Self {
        Self::with_target(SshConfig::new(address))
            .attach_and_connect(credential)
            .await
    }

    /// [`connect_and_attach`](Self::connect_and_attach) for a custom target
    pub async fn attach_and_connect(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        if let Err(e) = self.connect().await {
            warn!("Initial connect to {} failed: {}", self.target.address(), e);
        }
        self
    }

    pub fn address(&self) -> &str {
        &self.target.host
    }

    pub fn target(&self) -> &SshConfig {
        &self.target
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn credential_mut(&mut self) -> Option<&mut Credential> {
        self.credential.as_mut()
    }

    /// Replace the credential without connecting. Returns the previous one.
    pub fn set_credential(&mut self, credential: Credential) -> Option<Credential> {
        self.credential.replace(credential)
    }

    /// Log in with the attached credential
    pub async fn connect(&mut self) -> Result<()> {
        match self.credential.as_mut() {
            Some(credential) => credential.connect(&self.target).await,
            None => Err(AutolinuxError::auth("no credential attached")),
        }
    }

    /// Reconnect and run `uname -a`; `true` iff it printed something.
    ///
    /// Every failure along the way counts as `false`.
    pub async fn test(&mut self) -> bool {
        match self.probe().await {
            Ok(alive) => alive,
            Err(e) => {
                debug!("Probe of {} failed: {}", self.target.address(), e);
                false
            }
        }
    }

    async fn probe(&mut self) -> Result<bool> {
        self.connect().await?;
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| AutolinuxError::auth("no credential attached"))?;
        let out = credential.run_command(PROBE_COMMAND).await?;
        Ok(out.get(STDOUT).is_some_and(|stdout| !stdout.is_empty()))
    }
}
