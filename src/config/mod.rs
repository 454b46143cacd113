// ABOUTME: Immutable run configuration built by the parameter collector.
// ABOUTME: Deployment and teardown requests, remote filesystem layout, and timings.

mod credential;
mod file;
mod prompt;
mod target;

pub use credential::CredentialSource;
pub use file::{CONFIG_FILENAME, DeployFile};
pub use prompt::{Prompter, TerminalPrompter, collect_deployment, collect_teardown};
pub use target::{RemoteTarget, prepare_key};

use crate::types::{AppName, ContainerPort, RepoUrl};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_BASE_DIR: &str = "/opt/apps";

/// Everything a deployment run needs, collected once and passed by reference.
#[derive(Debug)]
pub struct DeploymentRequest {
    pub repository: RepoUrl,
    /// Never logged. Only exposed to build the clone URL.
    pub credential: SecretString,
    pub branch: String,
    pub remote: RemoteTarget,
    pub container_port: ContainerPort,
    /// Local directory the working copy is created in.
    pub workspace: PathBuf,
    pub layout: RemoteLayout,
    pub timings: Timings,
    /// Identifies this invocation in staging paths and the log file name.
    pub run_id: String,
}

impl DeploymentRequest {
    pub fn app_name(&self) -> &AppName {
        self.repository.app_name()
    }

    /// Local path of the working copy.
    pub fn working_copy_path(&self) -> PathBuf {
        self.workspace.join(self.app_name().as_str())
    }
}

/// Inputs for the teardown flow. No repository access is needed.
#[derive(Debug)]
pub struct TeardownRequest {
    pub remote: RemoteTarget,
    pub app_name: AppName,
    pub layout: RemoteLayout,
    pub timings: Timings,
}

/// Remote filesystem paths, all keyed by application name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteLayout {
    /// Parent of every release directory.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    /// Staging root, relative to the remote user's home.
    #[serde(default = "default_staging_root")]
    pub staging_root: String,
    #[serde(default = "default_nginx_available")]
    pub nginx_available: String,
    #[serde(default = "default_nginx_enabled")]
    pub nginx_enabled: String,
}

fn default_base_dir() -> String {
    DEFAULT_BASE_DIR.to_string()
}

fn default_staging_root() -> String {
    ".gangway/staging".to_string()
}

fn default_nginx_available() -> String {
    "/etc/nginx/sites-available".to_string()
}

fn default_nginx_enabled() -> String {
    "/etc/nginx/sites-enabled".to_string()
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            staging_root: default_staging_root(),
            nginx_available: default_nginx_available(),
            nginx_enabled: default_nginx_enabled(),
        }
    }
}

impl RemoteLayout {
    pub fn release_dir(&self, app: &AppName) -> String {
        format!("{}/{}", self.base_dir.trim_end_matches('/'), app)
    }

    /// Per-run staging directory, relative to the remote home so that both
    /// scp and remote shells resolve it the same way.
    pub fn staging_dir(&self, app: &AppName, run_id: &str) -> String {
        let host = gethostname::gethostname().to_string_lossy().into_owned();
        let host: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!(
            "{}/{}-{}-{}",
            self.staging_root.trim_end_matches('/'),
            app,
            host,
            run_id
        )
    }

    pub fn proxy_rule_path(&self, app: &AppName) -> String {
        format!("{}/{}", self.nginx_available.trim_end_matches('/'), app)
    }

    pub fn proxy_link_path(&self, app: &AppName) -> String {
        format!("{}/{}", self.nginx_enabled.trim_end_matches('/'), app)
    }

    /// The distribution's catch-all site, removed so it cannot shadow the app.
    pub fn default_site_link(&self) -> String {
        format!("{}/default", self.nginx_enabled.trim_end_matches('/'))
    }
}

/// Waits and timeouts used across the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Timings {
    /// Wait after starting the container before checking it is up.
    #[serde(default = "default_post_start_grace", with = "humantime_serde")]
    pub post_start_grace: Duration,

    /// Wait before the first health probe.
    #[serde(default = "default_warmup", with = "humantime_serde")]
    pub warmup: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Upper bound for one remote command, such as an image build.
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Timeout for the probe sent from this machine to the public address.
    #[serde(default = "default_external_timeout", with = "humantime_serde")]
    pub external_timeout: Duration,
}

fn default_post_start_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_warmup() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(900)
}

fn default_external_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            post_start_grace: default_post_start_grace(),
            warmup: default_warmup(),
            poll_interval: default_poll_interval(),
            poll_attempts: default_poll_attempts(),
            connect_timeout: default_connect_timeout(),
            command_timeout: default_command_timeout(),
            external_timeout: default_external_timeout(),
        }
    }
}

impl Timings {
    /// No waiting at all. Used by tests driving a fake remote.
    pub fn immediate() -> Self {
        Self {
            post_start_grace: Duration::ZERO,
            warmup: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}
