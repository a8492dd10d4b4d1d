//! SSH plumbing on top of russh
//!
//! This module opens authenticated sessions, runs commands on exec
//! channels, moves files over SFTP, and verifies host keys.

pub mod command;
pub mod config;
pub mod handler;
pub mod session;
pub mod transfer;

// Re-exports
pub use command::{CommandOutput, CommandResult, STDERR, STDOUT};
pub use config::{HostKeyPolicy, SshConfig, DEFAULT_PORT};
pub use handler::SshHandler;
pub use session::{Connector, RemoteSession, RusshConnector, RusshSession};
pub use transfer::file_name_of;
