//! Command execution over SSH
//!
//! Provides the `CommandOutput` struct, its `stdout`/`stderr` mapping form,
//! and the channel draining used by [`RusshSession`](super::session::RusshSession).

use std::collections::BTreeMap;

use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg};
use serde::Serialize;
use tracing::debug;

use super::handler::SshHandler;
use crate::error::{AutolinuxError, Result};

/// Key holding standard output in a [`CommandResult`]
pub const STDOUT: &str = "stdout";

/// Key holding standard error in a [`CommandResult`]
pub const STDERR: &str = "stderr";

/// Command result shaped as a mapping.
///
/// Either empty (nothing ran) or holding exactly [`STDOUT`] and [`STDERR`].
pub type CommandResult = BTreeMap<String, String>;

/// Output from a command execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Standard output from the command
    pub stdout: String,

    /// Standard error from the command
    pub stderr: String,

    /// Exit code of the command (if available)
    pub exit_code: Option<u32>,
}

impl CommandOutput {
    /// Create a new empty CommandOutput
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the command succeeded (exit code 0 or no exit code available)
    pub fn success(&self) -> bool {
        self.exit_code.is_none_or(|code| code == 0)
    }

    /// Shape into the two-key `stdout`/`stderr` mapping
    pub fn into_result(self) -> CommandResult {
        BTreeMap::from([
            (STDOUT.to_string(), self.stdout),
            (STDERR.to_string(), self.stderr),
        ])
    }
}

impl From<CommandOutput> for CommandResult {
    fn from(output: CommandOutput) -> Self {
        output.into_result()
    }
}

/// Run `command` on a fresh exec channel and drain its output
pub(crate) async fn exec_on(handle: &Handle<SshHandler>, command: &str) -> Result<CommandOutput> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| AutolinuxError::command(format!("Failed to open channel: {}", e)))?;

    channel
        .exec(true, command)
        .await
        .map_err(|e| AutolinuxError::command(format!("Failed to exec command: {}", e)))?;

    Ok(collect_channel_output(channel).await)
}

/// Collect output from a channel until it closes
async fn collect_channel_output(mut channel: Channel<Msg>) -> CommandOutput {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            // ext == 1 is stderr
            ChannelMsg::ExtendedData { data, ext: 1 } => stderr.extend_from_slice(&data),
            ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    let output = CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    };

    debug!(
        "Command completed: exit_code={:?}, stdout_len={}, stderr_len={}",
        output.exit_code,
        output.stdout.len(),
        output.stderr.len()
    );

    output
}
