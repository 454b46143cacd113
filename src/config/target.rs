// ABOUTME: Remote deployment target: user, host, SSH port, and key file.
// ABOUTME: Parses "user@host[:port]" shorthands and prepares the private key for use.

use super::Timings;
use crate::error::{Error, Result};
use crate::ssh::SessionConfig;
use serde::Deserialize;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Where and as whom the deployment runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(rename = "key")]
    pub key_path: PathBuf,
    /// known_hosts file to check and record host keys in (default: `~/.ssh/known_hosts`).
    #[serde(default)]
    pub known_hosts: Option<PathBuf>,
}

fn default_port() -> u16 {
    22
}

impl RemoteTarget {
    pub fn new(user: impl Into<String>, host: impl Into<String>, key_path: PathBuf) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port: default_port(),
            key_path,
            known_hosts: None,
        }
    }

    /// Parse `user@host` or `user@host:port`, pairing it with a key path.
    pub fn parse(s: &str, key_path: PathBuf) -> std::result::Result<Self, String> {
        let s = s.trim();
        let (user, rest) = s
            .split_once('@')
            .ok_or_else(|| format!("expected user@host, got '{}'", s))?;

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port_str))?;
                (host, port)
            }
            None => (rest, default_port()),
        };

        if user.is_empty() {
            return Err("username cannot be empty".to_string());
        }
        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
            key_path,
            known_hosts: None,
        })
    }

    /// `user@host` as used by ssh and scp.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    pub fn session_config(&self, timings: &Timings) -> SessionConfig {
        let config = SessionConfig::new(&self.host, &self.user, &self.key_path)
            .port(self.port)
            .connect_timeout(timings.connect_timeout)
            .command_timeout(timings.command_timeout);
        match self.known_hosts_path() {
            Some(path) => config.known_hosts_path(path),
            None => config,
        }
    }

    /// The configured known_hosts file with `~/` expanded.
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        self.known_hosts.as_deref().map(expand_home)
    }
}

/// Validate that the key file exists and restrict it to owner read/write.
///
/// A leading `~/` is expanded against `$HOME`.
pub fn prepare_key(path: &Path) -> Result<PathBuf> {
    let path = expand_home(path);
    if !path.is_file() {
        return Err(Error::KeyNotFound(path));
    }

    let mut perms = std::fs::metadata(&path)?.permissions();
    if perms.mode() & 0o777 != 0o600 {
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
        tracing::debug!("Restricted permissions on {} to 0600", path.display());
    }

    Ok(path)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
