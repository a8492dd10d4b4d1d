//! SSH target configuration
//!
//! Where to connect and how far to trust the server's host key.
//! Credentials live on [`Credential`](crate::credential::Credential), not here.

use std::path::PathBuf;
use std::time::Duration;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// How the server's host key is verified during the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key without consulting a known_hosts store
    /// (trust-on-first-use). Vulnerable to man-in-the-middle attacks.
    #[default]
    AutoAccept,

    /// Accept only keys listed in a known_hosts file.
    /// `None` means `~/.ssh/known_hosts`.
    StrictKnownHosts { known_hosts: Option<PathBuf> },

    /// Accept only the key with this SHA-256 fingerprint (`SHA256:...`)
    PinnedFingerprint(String),
}

/// SSH connection target
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Host key verification policy
    pub host_key_policy: HostKeyPolicy,

    /// Optional bound on the TCP connect + handshake
    pub connect_timeout: Option<Duration>,
}

impl SshConfig {
    /// Create a target on the default port with the default policy
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: None,
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the host key policy
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Bound the connection handshake
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `host:port` form used for logging and socket resolution
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
