//! autolinux - Linux automation over SSH
//!
//! A thin layer over [`russh`] for logging in to remote Linux hosts,
//! running shell commands and copying files.
//!
//! # Features
//!
//! - Key or password login, key preferred ([`Credential::connect`])
//! - Commands returning a `stdout`/`stderr` mapping ([`Credential::run_command`])
//! - File download and upload over SFTP with default file names
//! - Liveness probe via `uname -a` ([`Host::test`])
//! - Host key policies: auto-accept, known_hosts, pinned fingerprint
//!
//! # Example
//!
//! ```no_run
//! use autolinux::{Credential, Host};
//!
//! # async fn run() -> autolinux::Result<()> {
//! let user = Credential::new("ilker").with_key_path("/home/ilker/.ssh/id_ed25519");
//! let mut server = Host::connect_and_attach("blog.example.org", user).await;
//!
//! if let Some(user) = server.credential_mut() {
//!     let out = user.run_command("df -h").await?;
//!     println!("{}", out.get("stdout").map(String::as_str).unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod host;
pub mod ssh;

// Re-exports for convenience
pub use config::{Args, Config};
pub use credential::Credential;
pub use error::{AutolinuxError, Result};
pub use host::Host;
pub use ssh::{CommandOutput, CommandResult, HostKeyPolicy, SshConfig};
