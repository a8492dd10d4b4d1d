//! Configuration and CLI argument parsing for the `autolinux` binary
//!
//! The library itself never reads the environment; only the binary does,
//! through the `AUTOLINUX_*` variables declared here.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::credential::Credential;
use crate::error::{AutolinuxError, Result};
use crate::ssh::{HostKeyPolicy, SshConfig};

/// autolinux CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "autolinux")]
#[command(version)]
#[command(about = "Run commands and copy files on a remote Linux host over SSH")]
pub struct Args {
    /// SSH host to connect to
    #[arg(long, env = "AUTOLINUX_HOST")]
    pub host: String,

    /// SSH port
    #[arg(long, default_value = "22", env = "AUTOLINUX_PORT")]
    pub port: u16,

    /// SSH username
    #[arg(long, env = "AUTOLINUX_USER")]
    pub user: String,

    /// SSH password (used when no key is given)
    #[arg(long, env = "AUTOLINUX_PASSWORD")]
    pub password: Option<String>,

    /// Path to SSH private key file (tried before the password)
    #[arg(long, env = "AUTOLINUX_KEY")]
    pub key: Option<PathBuf>,

    /// Host key verification policy
    #[arg(long, value_enum, default_value = "auto", env = "AUTOLINUX_HOST_KEY_POLICY")]
    pub host_key_policy: PolicyArg,

    /// known_hosts file for the `strict` policy (default: ~/.ssh/known_hosts)
    #[arg(long, env = "AUTOLINUX_KNOWN_HOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Expected SHA-256 host key fingerprint for the `pinned` policy
    #[arg(long, env = "AUTOLINUX_FINGERPRINT")]
    pub fingerprint: Option<String>,

    /// Connection timeout in seconds (default: none)
    #[arg(long, env = "AUTOLINUX_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// Fail instead of skipping work when the login did not succeed
    #[arg(long, default_value = "false", env = "AUTOLINUX_STRICT")]
    pub strict: bool,

    /// Try the password if the key login fails
    #[arg(long, default_value = "false")]
    pub fallback_to_password: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Accept any host key
    Auto,
    /// Require the key to be in known_hosts
    Strict,
    /// Require --fingerprint to match
    Pinned,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a command and print {"stdout", "stderr"} as JSON
    Exec {
        /// Shell command to run
        command: String,
    },
    /// Download a remote file
    Get {
        remote: String,
        /// Local path (default: remote file name)
        local: Option<PathBuf>,
    },
    /// Upload a local file
    Put {
        local: PathBuf,
        /// Remote path (default: local file name)
        remote: Option<String>,
    },
    /// Check that the host answers `uname -a`
    Test,
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Where to connect
    pub target: SshConfig,

    /// SSH username
    pub user: String,

    /// SSH password
    pub password: Option<String>,

    /// Path to SSH private key
    pub key: Option<PathBuf>,

    pub strict: bool,
    pub fallback_to_password: bool,
    pub verbose: bool,
    pub action: Action,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        validate_args(&args)?;

        let policy = match args.host_key_policy {
            PolicyArg::Auto => HostKeyPolicy::AutoAccept,
            PolicyArg::Strict => HostKeyPolicy::StrictKnownHosts {
                known_hosts: args.known_hosts,
            },
            PolicyArg::Pinned => {
                HostKeyPolicy::PinnedFingerprint(args.fingerprint.unwrap_or_default())
            }
        };

        let mut target = SshConfig::new(args.host)
            .with_port(args.port)
            .with_host_key_policy(policy);
        if let Some(secs) = args.connect_timeout.filter(|s| *s > 0) {
            target = target.with_connect_timeout(Duration::from_secs(secs));
        }

        Ok(Config {
            target,
            user: args.user,
            password: sanitize_password(args.password),
            key: args.key,
            strict: args.strict,
            fallback_to_password: args.fallback_to_password,
            verbose: args.verbose,
            action: args.action,
        })
    }

    /// Build the credential described by this configuration
    pub fn credential(&self) -> Credential {
        let mut credential = Credential::new(&self.user)
            .strict(self.strict)
            .fallback_to_password(self.fallback_to_password);
        if let Some(ref password) = self.password {
            credential = credential.with_password(password);
        }
        if let Some(ref key) = self.key {
            credential = credential.with_key_path(key);
        }
        credential
    }
}

/// Validate CLI arguments
fn validate_args(args: &Args) -> Result<()> {
    let mut errors = Vec::new();

    if args.host.is_empty() {
        errors.push("Missing required --host".to_string());
    }

    if args.user.is_empty() {
        errors.push("Missing required --user".to_string());
    }

    // Must have either password or key
    if sanitize_password(args.password.clone()).is_none() && args.key.is_none() {
        errors.push("Must provide either --password or --key".to_string());
    }

    if let Some(ref key_path) = args.key {
        if !key_path.exists() {
            errors.push(format!("SSH key file not found: {}", key_path.display()));
        }
    }

    match args.host_key_policy {
        PolicyArg::Pinned if args.fingerprint.as_deref().is_none_or(str::is_empty) => {
            errors.push("--host-key-policy pinned requires --fingerprint".to_string());
        }
        _ => {}
    }

    if !errors.is_empty() {
        return Err(AutolinuxError::config(format!(
            "Configuration error:\n{}",
            errors.join("\n")
        )));
    }

    Ok(())
}

/// Sanitize password: return None if empty
fn sanitize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}
