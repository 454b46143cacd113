// ABOUTME: Moves the working copy onto the host: stage over scp, then promote to the release path.
// ABOUTME: Promotion is remove-then-move; a crash in between leaves no release directory.

use crate::config::RemoteTarget;
use crate::error::Result;
use crate::local::{self, LocalError};
use crate::remote::{RemoteExecutor, RemoteScript, Step, quote};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("scp to {destination} failed (exit code {exit_code:?}):\n{output}")]
    Scp {
        destination: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error(transparent)]
    Local(#[from] LocalError),
}

/// Copies a local directory into a remote directory.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Copy `local` into `remote_dir`, keeping its final path component.
    async fn upload(&self, local: &Path, remote_dir: &str) -> std::result::Result<(), TransferError>;
}

/// Uploads with the system `scp` client using the same key and port as the session.
pub struct Scp<'a> {
    target: &'a RemoteTarget,
    connect_timeout: Duration,
}

impl<'a> Scp<'a> {
    pub fn new(target: &'a RemoteTarget, connect_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
        }
    }

    fn args(&self, local: &Path, remote_dir: &str) -> Vec<String> {
        let mut args = vec![
            "-r".to_string(),
            "-q".to_string(),
            "-i".to_string(),
            self.target.key_path.to_string_lossy().into_owned(),
            "-P".to_string(),
            self.target.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ];
        if let Some(known_hosts) = self.target.known_hosts_path() {
            args.push("-o".to_string());
            args.push(format!("UserKnownHostsFile={}", known_hosts.display()));
        }
        args.push(local.to_string_lossy().into_owned());
        args.push(format!("{}:{}/", self.target.destination(), remote_dir));
        args
    }
}

#[async_trait]
impl Uploader for Scp<'_> {
    async fn upload(&self, local: &Path, remote_dir: &str) -> std::result::Result<(), TransferError> {
        let args = self.args(local, remote_dir);
        tracing::debug!("$ scp {}", args.join(" "));

        let output = local::run("scp", &args, None, &[]).await?;
        if output.success() {
            return Ok(());
        }
        Err(TransferError::Scp {
            destination: format!("{}:{}", self.target.destination(), remote_dir),
            exit_code: output.exit_code,
            output: output.combined(),
        })
    }
}

/// Empty staging directory, ready to receive the upload.
pub fn staging_script(staging: &str) -> RemoteScript {
    let staging = quote(staging);
    RemoteScript::new("stage")
        .step(Step::fatal("clear staging", format!("rm -rf {}", staging)))
        .step(Step::fatal("create staging", format!("mkdir -p {}", staging)))
}

/// Replace the release directory with the staged copy.
///
/// Containers may have left root-owned files in the previous release, so its
/// removal takes the `sudo` prefix.
pub fn promote_script(staged: &str, staging: &str, release_dir: &str, sudo: &str) -> RemoteScript {
    RemoteScript::new("release")
        .step(Step::fatal(
            "remove previous release",
            format!("{}rm -rf {}", sudo, quote(release_dir)),
        ))
        .step(Step::fatal(
            "move staged copy",
            format!("mv {} {}", quote(staged), quote(release_dir)),
        ))
        .step(Step::fatal(
            "remove staging",
            format!("rm -rf {}", quote(staging)),
        ))
}

/// Stage, upload and promote `working_copy` so it becomes `release_dir`.
pub async fn release<E, U>(
    executor: &E,
    uploader: &U,
    working_copy: &Path,
    staging: &str,
    release_dir: &str,
    sudo: &str,
) -> Result<()>
where
    E: RemoteExecutor + ?Sized,
    U: Uploader + ?Sized,
{
    let Some(dir_name) = working_copy.file_name() else {
        return Err(crate::error::Error::InvalidInput(format!(
            "working copy path has no final component: {}",
            working_copy.display()
        )));
    };
    let staged = format!("{}/{}", staging, dir_name.to_string_lossy());

    staging_script(staging).run(executor).await?;

    tracing::info!("Uploading {} to {}", working_copy.display(), staging);
    uploader.upload(working_copy, staging).await?;

    promote_script(&staged, staging, release_dir, sudo)
        .run(executor)
        .await?;
    tracing::info!("Release in place at {}", release_dir);
    Ok(())
}
