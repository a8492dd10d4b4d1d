//! Error types for autolinux

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for autolinux
#[derive(Debug, Error)]
pub enum AutolinuxError {
    /// No usable credential material, or the server rejected it
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Private key file missing, unreadable or malformed
    #[error("Failed to load key from {}: {reason}", path.display())]
    KeyLoad { path: PathBuf, reason: String },

    /// SFTP get/put failed
    #[error("Transfer of {path} failed: {reason}")]
    Transfer { path: String, reason: String },

    /// Operation needs an established session
    #[error("Not connected")]
    NotConnected,

    /// TCP connect or SSH handshake failed
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Remote command could not be run
    #[error("Command execution failed: {0}")]
    Command(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AutolinuxError
pub type Result<T> = std::result::Result<T, AutolinuxError>;

impl AutolinuxError {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        AutolinuxError::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        AutolinuxError::Authentication(msg.into())
    }

    /// Create a command error from a string
    pub fn command(msg: impl Into<String>) -> Self {
        AutolinuxError::Command(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        AutolinuxError::Config(msg.into())
    }

    pub fn key_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        AutolinuxError::KeyLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transfer(path: impl Into<String>, reason: impl ToString) -> Self {
        AutolinuxError::Transfer {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
