//! Credentials and the session they own
//!
//! A [`Credential`] is a username plus an optional password and/or private
//! key path. It chooses how to log in (key first, then password), owns the
//! resulting session, and exposes command execution and file copies on it.
//!
//! Using a credential that is not connected is lenient by default:
//! [`Credential::run_command`] yields an empty mapping and the copy
//! operations do nothing. [`Credential::strict`] turns those cases into
//! [`AutolinuxError::NotConnected`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::keys::load_secret_key;
use tracing::{debug, info, warn};

use crate::error::{AutolinuxError, Result};
use crate::ssh::{
    file_name_of, CommandOutput, CommandResult, Connector, RemoteSession, RusshConnector,
    SshConfig,
};

/// Status recorded after a successful connect
pub const STATUS_CONNECTED: &str = "connected";

pub const MSG_NO_KEY: &str = "no key file provided";
pub const MSG_NO_PASSWORD: &str = "no password provided";
pub const MSG_NO_CREDENTIALS: &str = "neither ssh private key nor password was given";

/// Login identity for a remote host
pub struct Credential {
    username: String,
    password: Option<String>,
    key_path: Option<PathBuf>,

    /// Live session, present only while connected
    session: Option<Box<dyn RemoteSession>>,
    connected: bool,

    /// Reason recorded by the last connect attempt
    status: Option<String>,

    strict: bool,
    fallback_to_password: bool,
    connector: Arc<dyn Connector>,
}

impl Credential {
    /// Create a credential with no secrets attached
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            key_path: None,
            session: None,
            connected: false,
            status: None,
            strict: false,
            fallback_to_password: false,
            connector: Arc::new(RusshConnector),
        }
    }

    /// Set the login password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the private key file. Tried before the password.
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Fail with `NotConnected` instead of silently doing nothing
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Try the password after a failed key login.
    ///
    /// Off by default: a key path that is set but fails ends the attempt.
    pub fn fallback_to_password(mut self, fallback: bool) -> Self {
        self.fallback_to_password = fallback;
        self
    }

    /// Replace the session opener
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }

    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Outcome of the last connect attempt. Not re-verified against the server.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Human-readable reason from the last connect attempt
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Log in with the private key only
    pub async fn connect_with_key(&mut self, target: &SshConfig) -> Result<()> {
        let result = self.open_with_key(target).await;
        self.finish_attempt(result).await
    }

    /// Log in, preferring the key over the password.
    ///
    /// When a key path is set its result is final unless
    /// [`fallback_to_password`](Self::fallback_to_password) is enabled.
    pub async fn connect(&mut self, target: &SshConfig) -> Result<()> {
        let result = match (&self.key_path, &self.password) {
            (Some(_), _) => match self.open_with_key(target).await {
                Ok(session) => Ok(session),
                Err(key_err) if self.fallback_to_password => {
                    warn!("Key authentication failed ({}), trying password", key_err);
                    match &self.password {
                        Some(_) => self.open_with_password(target).await,
                        None => Err(AutolinuxError::auth(format!(
                            "{} (key attempt: {})",
                            MSG_NO_PASSWORD, key_err
                        ))),
                    }
                }
                Err(key_err) => Err(key_err),
            },
            (None, Some(_)) => self.open_with_password(target).await,
            (None, None) => Err(AutolinuxError::auth(MSG_NO_CREDENTIALS)),
        };
        self.finish_attempt(result).await
    }

    async fn open_with_key(&self, target: &SshConfig) -> Result<Box<dyn RemoteSession>> {
        let path = self
            .key_path
            .as_ref()
            .ok_or_else(|| AutolinuxError::auth(MSG_NO_KEY))?;

        debug!("Loading private key from {}", path.display());
        let key = load_secret_key(path, None).map_err(|e| AutolinuxError::key_load(path, e))?;

        self.connector
            .open_with_key(target, &self.username, Arc::new(key))
            .await
    }

    async fn open_with_password(&self, target: &SshConfig) -> Result<Box<dyn RemoteSession>> {
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| AutolinuxError::auth(MSG_NO_PASSWORD))?;

        self.connector
            .open_with_password(target, &self.username, password)
            .await
    }

    /// Record the outcome of a connect attempt and swap the session
    async fn finish_attempt(&mut self, result: Result<Box<dyn RemoteSession>>) -> Result<()> {
        // The previous session is discarded whatever the outcome
        self.close_session().await;

        match result {
            Ok(session) => {
                info!("Connected as '{}'", self.username);
                self.session = Some(session);
                self.connected = true;
                self.status = Some(STATUS_CONNECTED.to_string());
                Ok(())
            }
            Err(e) => {
                warn!("Connect as '{}' failed: {}", self.username, e);
                self.connected = false;
                self.status = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                debug!("Error closing previous session: {}", e);
            }
        }
    }

    /// Disconnect the owned session, if any
    pub async fn close(&mut self) {
        self.close_session().await;
        self.connected = false;
    }

    /// Session to use, or the lenient/strict answer when there is none
    fn live_session(&self) -> Result<Option<&dyn RemoteSession>> {
        match (&self.session, self.connected) {
            (Some(session), true) => Ok(Some(session.as_ref())),
            _ if self.strict => Err(AutolinuxError::NotConnected),
            _ => Ok(None),
        }
    }

    /// Run a command, returning `stdout` and `stderr` as a mapping.
    ///
    /// Not connected: an empty mapping (or `NotConnected` when strict).
    pub async fn run_command(&self, cmd: &str) -> Result<CommandResult> {
        match self.live_session()? {
            Some(session) => Ok(session.exec(cmd).await?.into_result()),
            None => {
                warn!("Not connected, skipping command");
                Ok(CommandResult::new())
            }
        }
    }

    /// Run a command and keep the exit code. Always fails when not connected.
    pub async fn try_run_command(&self, cmd: &str) -> Result<CommandOutput> {
        match (&self.session, self.connected) {
            (Some(session), true) => session.exec(cmd).await,
            _ => Err(AutolinuxError::NotConnected),
        }
    }

    /// Download `remote`. Without `local`, the remote file name is used in
    /// the current directory. Existing local files are overwritten.
    pub async fn copy_file(&self, remote: &str, local: Option<&Path>) -> Result<()> {
        let Some(session) = self.live_session()? else {
            warn!("Not connected, skipping download of {}", remote);
            return Ok(());
        };

        let local = match local {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(
                file_name_of(remote)
                    .ok_or_else(|| AutolinuxError::transfer(remote, "no file name in path"))?,
            ),
        };

        session.download(remote, &local).await
    }

    /// Same as [`copy_file`](Self::copy_file)
    pub async fn copy_from_remote(&self, remote: &str, local: Option<&Path>) -> Result<()> {
        self.copy_file(remote, local).await
    }

    /// Upload `local`. Without `remote`, the local file name is used
    /// relative to the remote login directory.
    pub async fn copy_to_remote(&self, local: &Path, remote: Option<&str>) -> Result<()> {
        let local_display = local.display().to_string();
        let Some(session) = self.live_session()? else {
            warn!("Not connected, skipping upload of {}", local_display);
            return Ok(());
        };

        let remote = match remote {
            Some(name) => name.to_string(),
            None => file_name_of(&local_display)
                .ok_or_else(|| AutolinuxError::transfer(&local_display, "no file name in path"))?
                .to_string(),
        };

        session.upload(local, &remote).await
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("connected", &self.connected)
            .field("status", &self.status)
            .field("strict", &self.strict)
            .field("fallback_to_password", &self.fallback_to_password)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connector and session for exercising login policy

    use std::sync::Mutex;

    use async_trait::async_trait;
    use russh::keys::PrivateKey;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Key { host: String, username: String },
        Password { host: String, username: String, password: String },
        Exec(String),
        Download { remote: String, local: PathBuf },
        Upload { local: PathBuf, remote: String },
        Close,
    }

    /// Records every call; rejects the auth methods it is told to
    #[derive(Default)]
    pub struct FakeConnector {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub reject_key: bool,
        pub reject_password: bool,
        pub stdout: String,
    }

    impl FakeConnector {
        pub fn new() -> Self {
            Self {
                stdout: "Linux test-host 6.1.0 x86_64 GNU/Linux\n".to_string(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn session(&self) -> Box<dyn RemoteSession> {
            Box::new(FakeSession {
                calls: Arc::clone(&self.calls),
                stdout: self.stdout.clone(),
            })
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn open_with_key(
            &self,
            target: &SshConfig,
            username: &str,
            _key: Arc<PrivateKey>,
        ) -> Result<Box<dyn RemoteSession>> {
            self.calls.lock().unwrap().push(Call::Key {
                host: target.host.clone(),
                username: username.to_string(),
            });
            if self.reject_key {
                return Err(AutolinuxError::auth("Key authentication rejected"));
            }
            Ok(self.session())
        }

        async fn open_with_password(
            &self,
            target: &SshConfig,
            username: &str,
            password: &str,
        ) -> Result<Box<dyn RemoteSession>> {
            self.calls.lock().unwrap().push(Call::Password {
                host: target.host.clone(),
                username: username.to_string(),
                password: password.to_string(),
            });
            if self.reject_password {
                return Err(AutolinuxError::auth("Password authentication rejected"));
            }
            Ok(self.session())
        }
    }

    pub struct FakeSession {
        calls: Arc<Mutex<Vec<Call>>>,
        stdout: String,
    }

    #[async_trait]
    impl RemoteSession for FakeSession {
        async fn exec(&self, command: &str) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Exec(command.to_string()));
            Ok(CommandOutput {
                stdout: self.stdout.clone(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }

        async fn download(&self, remote: &str, local: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Download {
                remote: remote.to_string(),
                local: local.to_path_buf(),
            });
            Ok(())
        }

        async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Upload {
                local: local.to_path_buf(),
                remote: remote.to_string(),
            });
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Close);
            Ok(())
        }
    }

    /// An unencrypted ed25519 key in OpenSSH format
    pub const TEST_KEY: &str = include_str!("../tests/fixtures/test_key");

    pub fn write_test_key(dir: &Path) -> PathBuf {
        let path = dir.join("id_ed25519");
        std::fs::write(&path, TEST_KEY).unwrap();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn target() -> SshConfig {
        SshConfig::new("test-host")
    }

    #[tokio::test]
    async fn test_new_credential_is_disconnected() {
        let cred = Credential::new("ilker");

        assert_eq!(cred.username(), "ilker");
        assert!(!cred.is_connected());
        assert!(cred.status().is_none());
        assert!(!cred.has_password());
        assert!(cred.key_path().is_none());
    }

    #[tokio::test]
    async fn test_connect_without_any_secret_fails() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker").with_connector(connector.clone());

        let err = cred.connect(&target()).await.unwrap_err();

        assert!(err.to_string().contains(MSG_NO_CREDENTIALS));
        assert!(!cred.is_connected());
        assert_eq!(cred.status(), Some(err.to_string().as_str()));
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_connect_with_key_requires_key_path() {
        let mut cred = Credential::new("ilker")
            .with_password("secret")
            .with_connector(Arc::new(FakeConnector::new()));

        let err = cred.connect_with_key(&target()).await.unwrap_err();

        assert!(err.to_string().contains(MSG_NO_KEY));
        assert!(!cred.is_connected());
    }

    #[tokio::test]
    async fn test_unreadable_key_fails_with_key_load() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_key_path(dir.path().join("missing_key"))
            .with_connector(connector.clone());

        let err = cred.connect_with_key(&target()).await.unwrap_err();

        assert!(matches!(err, AutolinuxError::KeyLoad { .. }));
        assert!(!cred.is_connected());
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_key_fails_with_key_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        std::fs::write(&path, "not a private key").unwrap();
        let mut cred = Credential::new("ilker")
            .with_key_path(&path)
            .with_connector(Arc::new(FakeConnector::new()));

        let err = cred.connect(&target()).await.unwrap_err();

        assert!(matches!(err, AutolinuxError::KeyLoad { .. }));
        assert!(!cred.is_connected());
    }

    #[tokio::test]
    async fn test_connect_prefers_key() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_key_path(write_test_key(dir.path()))
            .with_password("secret")
            .with_connector(connector.clone());

        cred.connect(&target()).await.unwrap();

        assert!(cred.is_connected());
        assert_eq!(cred.status(), Some(STATUS_CONNECTED));
        assert_eq!(
            connector.calls(),
            vec![Call::Key {
                host: "test-host".to_string(),
                username: "ilker".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_key_does_not_fall_back_to_password() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(FakeConnector {
            reject_key: true,
            ..FakeConnector::new()
        });
        let mut cred = Credential::new("ilker")
            .with_key_path(write_test_key(dir.path()))
            .with_password("secret")
            .with_connector(connector.clone());

        assert!(cred.connect(&target()).await.is_err());

        assert!(!cred.is_connected());
        assert_eq!(connector.calls().len(), 1);
        assert!(matches!(connector.calls()[0], Call::Key { .. }));
    }

    #[tokio::test]
    async fn test_fallback_to_password_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let connector = Arc::new(FakeConnector {
            reject_key: true,
            ..FakeConnector::new()
        });
        let mut cred = Credential::new("ilker")
            .with_key_path(write_test_key(dir.path()))
            .with_password("secret")
            .fallback_to_password(true)
            .with_connector(connector.clone());

        cred.connect(&target()).await.unwrap();

        assert!(cred.is_connected());
        assert!(matches!(connector.calls()[1], Call::Password { .. }));
    }

    #[tokio::test]
    async fn test_fallback_without_password_reports_missing_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut cred = Credential::new("ilker")
            .with_key_path(dir.path().join("missing_key"))
            .fallback_to_password(true)
            .with_connector(Arc::new(FakeConnector::new()));

        let err = cred.connect(&target()).await.unwrap_err();

        assert!(err.to_string().contains(MSG_NO_PASSWORD));
        assert!(err.to_string().contains("missing_key"));
    }

    #[tokio::test]
    async fn test_password_login() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());

        cred.connect(&target()).await.unwrap();

        assert!(cred.is_connected());
        assert_eq!(
            connector.calls(),
            vec![Call::Password {
                host: "test-host".to_string(),
                username: "ilker".to_string(),
                password: "deneme".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_rejected_password_leaves_commands_empty() {
        let connector = Arc::new(FakeConnector {
            reject_password: true,
            ..FakeConnector::new()
        });
        let mut cred = Credential::new("ilker")
            .with_password("wrong")
            .with_connector(connector);

        let err = cred.connect(&target()).await.unwrap_err();
        assert!(err.to_string().contains("rejected"));

        let out = cred.run_command("uname -a").await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_closes_previous_session() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());

        cred.connect(&target()).await.unwrap();
        cred.connect(&target()).await.unwrap();

        let calls = connector.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0], Call::Password { .. }));
        assert!(matches!(calls[1], Call::Password { .. }));
        assert_eq!(calls[2], Call::Close);
        assert!(cred.is_connected());
    }

    #[tokio::test]
    async fn test_run_command_disconnected_is_empty() {
        let cred = Credential::new("ilker");

        let out = cred.run_command("uname -a").await.unwrap();

        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_command_disconnected_strict() {
        let cred = Credential::new("ilker").strict(true);

        let err = cred.run_command("uname -a").await.unwrap_err();

        assert!(matches!(err, AutolinuxError::NotConnected));
    }

    #[tokio::test]
    async fn test_try_run_command_disconnected() {
        let cred = Credential::new("ilker");

        assert!(matches!(
            cred.try_run_command("true").await,
            Err(AutolinuxError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_run_command_connected() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());
        cred.connect(&target()).await.unwrap();

        let out = cred.run_command("uname -a").await.unwrap();

        assert_eq!(out.len(), 2);
        assert!(out["stdout"].starts_with("Linux"));
        assert_eq!(out["stderr"], "");
        assert_eq!(connector.calls()[1], Call::Exec("uname -a".to_string()));
    }

    #[tokio::test]
    async fn test_copy_file_defaults_local_name() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());
        cred.connect(&target()).await.unwrap();

        cred.copy_file("/etc/hosts", None).await.unwrap();

        assert_eq!(
            connector.calls()[1],
            Call::Download {
                remote: "/etc/hosts".to_string(),
                local: PathBuf::from("hosts")
            }
        );
    }

    #[tokio::test]
    async fn test_copy_from_remote_explicit_local() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());
        cred.connect(&target()).await.unwrap();

        cred.copy_from_remote("/etc/hosts", Some(Path::new("/tmp/remote_hosts")))
            .await
            .unwrap();

        assert_eq!(
            connector.calls()[1],
            Call::Download {
                remote: "/etc/hosts".to_string(),
                local: PathBuf::from("/tmp/remote_hosts")
            }
        );
    }

    #[tokio::test]
    async fn test_copy_to_remote_defaults_remote_name() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());
        cred.connect(&target()).await.unwrap();

        cred.copy_to_remote(Path::new("/home/ilker/report.txt"), None)
            .await
            .unwrap();

        assert_eq!(
            connector.calls()[1],
            Call::Upload {
                local: PathBuf::from("/home/ilker/report.txt"),
                remote: "report.txt".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_copy_disconnected_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cred = Credential::new("ilker");
        let local = dir.path().join("hosts");

        cred.copy_file("/etc/hosts", Some(&local)).await.unwrap();
        cred.copy_to_remote(&local, Some("/tmp/hosts")).await.unwrap();

        assert!(!local.exists());
    }

    #[tokio::test]
    async fn test_copy_disconnected_strict() {
        let cred = Credential::new("ilker").strict(true);

        assert!(matches!(
            cred.copy_file("/etc/hosts", None).await,
            Err(AutolinuxError::NotConnected)
        ));
        assert!(matches!(
            cred.copy_to_remote(Path::new("hosts"), None).await,
            Err(AutolinuxError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_copy_without_derivable_name() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());
        cred.connect(&target()).await.unwrap();

        let err = cred.copy_file("/etc/", None).await.unwrap_err();
        assert!(matches!(err, AutolinuxError::Transfer { .. }));

        let err = cred.copy_to_remote(Path::new("/tmp/"), None).await.unwrap_err();
        assert!(matches!(err, AutolinuxError::Transfer { .. }));

        // only the login reached the connector
        assert_eq!(connector.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_copy_without_derivable_name_disconnected_is_noop() {
        let cred = Credential::new("ilker");

        cred.copy_file("/etc/", None).await.unwrap();
        cred.copy_to_remote(Path::new("/tmp/"), None).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let connector = Arc::new(FakeConnector::new());
        let mut cred = Credential::new("ilker")
            .with_password("deneme")
            .with_connector(connector.clone());
        cred.connect(&target()).await.unwrap();

        cred.close().await;
        cred.close().await;

        assert!(!cred.is_connected());
        assert_eq!(connector.calls().last(), Some(&Call::Close));
        assert_eq!(connector.calls().len(), 2);
    }

    #[test]
    fn test_debug_redacts_password() {
        let cred = Credential::new("ilker").with_password("hunter2");

        let debug = format!("{:?}", cred);

        assert!(debug.contains("ilker"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("fallback_to_password: false"));
        assert!(debug.contains("has_session: false"));
    }
}
