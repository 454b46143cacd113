// ABOUTME: Application-wide error types for gangway.
// ABOUTME: Uses thiserror; every fatal condition of a run ends up here.

use crate::container::ContainerError;
use crate::local::LocalError;
use crate::release::TransferError;
use crate::remote::ScriptError;
use crate::source::SyncError;
use crate::validate::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("SSH key not found or not a regular file: {0}")]
    KeyNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Local(#[from] LocalError),

    #[error("source sync failed: {0}")]
    Sync(#[from] SyncError),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("remote command failed: {0}")]
    Remote(#[from] ScriptError),

    #[error("file transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("container check failed: {0}")]
    Container(#[from] ContainerError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Prompt(err.to_string())
    }
}

impl Error {
    /// Whether the run failed before anything was changed on the remote host.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Error::KeyNotFound(_)
                | Error::InvalidInput(_)
                | Error::InvalidConfig(_)
                | Error::MissingEnvVar(_)
                | Error::Prompt(_)
                | Error::Local(LocalError::MissingTool(_))
                | Error::Sync(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
