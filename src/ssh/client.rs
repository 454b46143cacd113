// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, key authentication, and streamed command execution.

use super::error::{Error, Result};
use russh::client::{self, Config, Handle};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::{ChannelMsg, Disconnect};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Tracing target for output streamed back from the remote host.
pub const REMOTE_TARGET: &str = "gangway::remote";

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    /// Private key used for authentication.
    pub key_path: PathBuf,
    /// Optional path to known_hosts file. Unknown hosts are trusted on first
    /// use and recorded there; changed keys are always rejected.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Timeout for the TCP connect and handshake (default: 10 seconds).
    pub connect_timeout: Duration,
    /// Timeout for command execution (default: 15 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: key_path.into(),
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(10),
            // Image builds and package installs run inside a single command.
            command_timeout: Duration::from_secs(900),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// `user@host` for log lines and diagnostics.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        out
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    known_hosts_path: Option<PathBuf>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                let learn_result = match &self.known_hosts_path {
                    Some(path) => {
                        learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                    }
                    None => learn_known_hosts(&self.host, self.port, server_public_key),
                };
                if let Err(e) = learn_result {
                    tracing::warn!("Failed to save host key to known_hosts: {}", e);
                }
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    "Host key for {}:{} does not match known_hosts line {}",
                    self.host,
                    self.port,
                    line
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Could not read known_hosts, trusting host key: {}", e);
                Ok(true)
            }
        }
    }
}

/// Splits streamed channel data into lines and forwards them to the run log.
#[derive(Default)]
struct LineLogger {
    pending: Vec<u8>,
}

impl LineLogger {
    fn feed(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            emit_line(&line);
        }
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            emit_line(&line);
        }
    }
}

fn emit_line(line: &[u8]) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\r', '\n']);
    if !text.is_empty() {
        tracing::info!(target: REMOTE_TARGET, "{}", text);
    }
}

/// An established SSH session.
pub struct Session {
    config: SessionConfig,
    handle: Handle<SshHandler>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Session {
    /// Connect to the remote host and authenticate with the configured key.
    ///
    /// The TCP connect and handshake are bounded by `connect_timeout`.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let key = load_secret_key(&config.key_path, None).map_err(|e| Error::KeyLoadFailed {
            path: config.key_path.clone(),
            reason: e.to_string(),
        })?;

        let russh_config = Config {
            inactivity_timeout: Some(config.command_timeout),
            keepalive_interval: Some(Duration::from_secs(15)),
            ..Default::default()
        };

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let connecting = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        );

        let mut handle = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| Error::ConnectTimeout {
                host: config.host.clone(),
                port: config.port,
                timeout: config.connect_timeout,
            })?
            .map_err(|e| {
                if e.to_string().contains("Connection refused") {
                    Error::Connection(format!(
                        "connection refused to {}:{}",
                        config.host, config.port
                    ))
                } else {
                    Error::Connection(e.to_string())
                }
            })?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .map_err(Error::Protocol)?
            .flatten();

        let auth = handle
            .authenticate_publickey(
                &config.user,
                PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
            )
            .await
            .map_err(Error::Protocol)?;

        if !auth.success() {
            return Err(Error::AuthenticationFailed {
                user: config.user.clone(),
                host: config.host.clone(),
            });
        }

        Ok(Self { config, handle })
    }

    /// Run a trivial command to prove the session can execute commands.
    pub async fn probe(&self) -> Result<()> {
        let output = self
            .exec_with_timeout("echo ok", self.config.connect_timeout)
            .await?;
        if !output.success() || output.stdout.trim() != "ok" {
            return Err(Error::CommandFailed(format!(
                "connectivity probe returned exit code {}: {}",
                output.exit_code,
                output.combined()
            )));
        }
        Ok(())
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut out_log = LineLogger::default();
        let mut err_log = LineLogger::default();
        let mut exit_code = 0u32;

        let mut got_exit_status = false;
        let mut got_eof = false;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    out_log.feed(&data);
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        err_log.feed(&data);
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = exit_status;
                    got_exit_status = true;
                    if got_eof {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) => {
                    got_eof = true;
                    if got_exit_status {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => break,
                Some(_) => {}
                None => break,
            }
        }

        out_log.flush();
        err_log.flush();

        // A channel that closes without an exit status means the transport died.
        if !got_exit_status {
            return Err(Error::ChannelClosed);
        }

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }

    /// Disconnect the session.
    pub async fn disconnect(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_defaults() {
        let config = SessionConfig::new("app.example.com", "deploy", "/tmp/id_ed25519");
        assert_eq!(config.port, 22);
        assert!(config.known_hosts_path.is_none());
        assert_eq!(config.command_timeout, Duration::from_secs(900));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.destination(), "deploy@app.example.com");
    }

    #[test]
    fn combined_output_joins_streams() {
        let output = CommandOutput {
            exit_code: 1,
            stdout: "building\n".to_string(),
            stderr: "failed\n".to_string(),
        };
        assert_eq!(output.combined(), "building\nfailed");
    }

    #[test]
    fn combined_output_without_stderr() {
        let output = CommandOutput {
            exit_code: 0,
            stdout: "200".to_string(),
            stderr: String::new(),
        };
        assert_eq!(output.combined(), "200");
    }

    #[test]
    fn line_logger_keeps_partial_line_until_flush() {
        let mut logger = LineLogger::default();
        logger.feed(b"first\nsec");
        assert_eq!(logger.pending, b"sec");
        logger.feed(b"ond\n");
        assert!(logger.pending.is_empty());
        logger.feed(b"tail");
        logger.flush();
        assert!(logger.pending.is_empty());
    }
}
