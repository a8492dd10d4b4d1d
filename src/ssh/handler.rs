//! SSH client handler implementation
//!
//! Implements the `russh::client::Handler` trait to verify the server's
//! host key according to a [`HostKeyPolicy`].

use std::path::PathBuf;

use russh::keys::known_hosts::{check_known_hosts, check_known_hosts_path};
use russh::keys::ssh_key::HashAlg;
use russh::keys::PublicKey;
use tracing::{debug, warn};

use super::config::{HostKeyPolicy, SshConfig};

/// SSH client handler for russh
#[derive(Debug, Clone)]
pub struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl SshHandler {
    /// Create a handler enforcing the target's host key policy
    pub fn new(target: &SshConfig) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            policy: target.host_key_policy.clone(),
        }
    }

    fn verify(&self, key: &PublicKey) -> bool {
        match &self.policy {
            HostKeyPolicy::AutoAccept => {
                warn!(
                    "Accepting host key for {}:{} without verification",
                    self.host, self.port
                );
                true
            }
            HostKeyPolicy::StrictKnownHosts { known_hosts } => {
                self.check_known_hosts(key, known_hosts.as_ref())
            }
            HostKeyPolicy::PinnedFingerprint(expected) => {
                let actual = key.fingerprint(HashAlg::Sha256).to_string();
                let matches = fingerprint_matches(expected, &actual);
                if !matches {
                    warn!(
                        "Host key fingerprint mismatch for {}:{}: expected {}, got {}",
                        self.host, self.port, expected, actual
                    );
                }
                matches
            }
        }
    }

    fn check_known_hosts(&self, key: &PublicKey, path: Option<&PathBuf>) -> bool {
        let result = match path {
            Some(path) => check_known_hosts_path(&self.host, self.port, key, path),
            None => check_known_hosts(&self.host, self.port, key),
        };

        match result {
            Ok(true) => true,
            Ok(false) => {
                warn!("Host {}:{} not found in known_hosts", self.host, self.port);
                false
            }
            Err(e) => {
                warn!(
                    "Host key check against known_hosts failed for {}:{}: {}",
                    self.host, self.port, e
                );
                false
            }
        }
    }
}

/// Compare fingerprints, tolerating a missing `SHA256:` prefix on the pinned value
pub(crate) fn fingerprint_matches(expected: &str, actual: &str) -> bool {
    let strip = |s: &str| s.trim().trim_start_matches("SHA256:").to_string();
    strip(expected) == strip(actual)
}

impl russh::client::Handler for SshHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = self.verify(server_public_key);
        debug!(
            "Host key for {}:{} {}",
            self.host,
            self.port,
            if accepted { "accepted" } else { "rejected" }
        );
        Ok(accepted)
    }
}
