//! File transfer over the SFTP subsystem
//!
//! The remote `sshd` must expose the `sftp` subsystem
//! (`Subsystem sftp internal-sftp` or similar in sshd_config).

use std::path::Path;

use russh::client::Handle;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::handler::SshHandler;
use crate::error::{AutolinuxError, Result};

/// Last `/`-separated segment of a path, used when a copy target is omitted.
///
/// Returns `None` when the path ends with a separator or is empty.
pub fn file_name_of(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

async fn open_sftp(handle: &Handle<SshHandler>, path: &str) -> Result<SftpSession> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| AutolinuxError::transfer(path, format!("failed to open channel: {}", e)))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| AutolinuxError::transfer(path, format!("sftp subsystem: {}", e)))?;
    SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| AutolinuxError::transfer(path, e))
}

async fn close_sftp(sftp: SftpSession) {
    if let Err(e) = sftp.close().await {
        debug!("Error closing sftp session: {}", e);
    }
}

/// Remove a partially written download
async fn discard_partial(local: &Path) {
    if let Err(e) = tokio::fs::remove_file(local).await {
        debug!("Error removing partial download {}: {}", local.display(), e);
    }
}

/// Download `remote` into `local`, overwriting any existing local file
pub(crate) async fn download(handle: &Handle<SshHandler>, remote: &str, local: &Path) -> Result<()> {
    let sftp = open_sftp(handle, remote).await?;

    let mut remote_file = sftp
        .open_with_flags(remote, OpenFlags::READ)
        .await
        .map_err(|e| AutolinuxError::transfer(remote, e))?;

    let mut local_file = tokio::fs::File::create(local)
        .await
        .map_err(|e| AutolinuxError::transfer(local.display().to_string(), e))?;

    let bytes = match tokio::io::copy(&mut remote_file, &mut local_file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(local_file);
            discard_partial(local).await;
            return Err(AutolinuxError::transfer(remote, e));
        }
    };
    local_file
        .flush()
        .await
        .map_err(|e| AutolinuxError::transfer(local.display().to_string(), e))?;

    close_sftp(sftp).await;
    debug!("Downloaded {} -> {} ({} bytes)", remote, local.display(), bytes);
    Ok(())
}

/// Upload `local` to `remote`, creating or truncating the remote file
pub(crate) async fn upload(handle: &Handle<SshHandler>, local: &Path, remote: &str) -> Result<()> {
    let mut local_file = tokio::fs::File::open(local)
        .await
        .map_err(|e| AutolinuxError::transfer(local.display().to_string(), e))?;

    let sftp = open_sftp(handle, remote).await?;

    let mut remote_file = sftp
        .open_with_flags(
            remote,
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        )
        .await
        .map_err(|e| AutolinuxError::transfer(remote, e))?;

    let bytes = tokio::io::copy(&mut local_file, &mut remote_file)
        .await
        .map_err(|e| AutolinuxError::transfer(remote, e))?;
    remote_file
        .shutdown()
        .await
        .map_err(|e| AutolinuxError::transfer(remote, e))?;

    close_sftp(sftp).await;
    debug!("Uploaded {} -> {} ({} bytes)", local.display(), remote, bytes);
    Ok(())
}
