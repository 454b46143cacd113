// ABOUTME: Non-interactive deploy file (gangway.yml) as an alternative to prompts.
// ABOUTME: Validated with the same rules the interactive collector applies.

use super::credential::CredentialSource;
use super::target::{RemoteTarget, prepare_key};
use super::{DEFAULT_BRANCH, DeploymentRequest, RemoteLayout, TeardownRequest, Timings};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::types::{AppName, ContainerPort, RepoUrl};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "gangway.yml";

/// Contents of a deploy file.
///
/// ```yaml
/// repository: https://github.com/acme/widgets.git
/// credential: { env: GIT_TOKEN }
/// branch: main
/// remote: deploy@203.0.113.10:22
/// key: ~/.ssh/id_ed25519
/// container_port: 8080
/// timings:
///   warmup: 20s
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployFile {
    #[serde(default)]
    pub repository: Option<String>,

    #[serde(default)]
    pub credential: Option<CredentialSource>,

    #[serde(default)]
    pub branch: Option<String>,

    pub remote: RemoteEntry,

    /// Key path for the `user@host` shorthand form of `remote`.
    #[serde(default)]
    pub key: Option<PathBuf>,

    #[serde(default)]
    pub container_port: Option<ContainerPort>,

    /// Application to tear down. Derived from `repository` when absent.
    #[serde(default)]
    pub app: Option<String>,

    /// Local directory for the working copy (default: current directory).
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    #[serde(default)]
    pub layout: RemoteLayout,

    #[serde(default)]
    pub timings: Timings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RemoteEntry {
    Simple(String),
    Detailed(RemoteTarget),
}

impl DeployFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    fn remote_target(&self) -> Result<RemoteTarget> {
        let target = match &self.remote {
            RemoteEntry::Detailed(target) => target.clone(),
            RemoteEntry::Simple(s) => {
                let key = self.key.clone().ok_or_else(|| {
                    Error::InvalidConfig("'key' is required with the user@host form".to_string())
                })?;
                RemoteTarget::parse(s, key).map_err(Error::InvalidConfig)?
            }
        };

        let key_path = prepare_key(&target.key_path)?;
        Ok(RemoteTarget { key_path, ..target })
    }

    /// Build a deployment request, applying the collector's validation rules.
    pub fn into_deployment(
        self,
        run_id: &str,
        cwd: &Path,
        diag: &mut Diagnostics,
    ) -> Result<DeploymentRequest> {
        let repository = self
            .repository
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("'repository' is required".to_string()))?;
        let repository = RepoUrl::parse(repository)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let credential = match &self.credential {
            Some(source) => source.resolve()?,
            None => SecretString::from(String::new()),
        };
        if credential.expose_secret().is_empty() {
            diag.warn(Warning::empty_credential());
        }

        let branch = self
            .branch
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH)
            .to_string();

        let container_port = self
            .container_port
            .ok_or_else(|| Error::InvalidConfig("'container_port' is required".to_string()))?;

        let remote = self.remote_target()?;

        Ok(DeploymentRequest {
            repository,
            credential,
            branch,
            remote,
            container_port,
            workspace: self.workspace.unwrap_or_else(|| cwd.to_path_buf()),
            layout: self.layout,
            timings: self.timings,
            run_id: run_id.to_string(),
        })
    }

    /// Build a teardown request from `app`, or from the repository name.
    pub fn into_teardown(self) -> Result<TeardownRequest> {
        let app_name = match (&self.app, &self.repository) {
            (Some(app), _) => AppName::new(app).map_err(|e| Error::InvalidInput(e.to_string()))?,
            (None, Some(repo)) => RepoUrl::parse(repo)
                .map_err(|e| Error::InvalidInput(e.to_string()))?
                .app_name()
                .clone(),
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "teardown needs 'app' or 'repository'".to_string(),
                ));
            }
        };

        Ok(TeardownRequest {
            remote: self.remote_target()?,
            app_name,
            layout: self.layout,
            timings: self.timings,
        })
    }
}
