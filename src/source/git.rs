// ABOUTME: Git operations for source sync: clone, fetch, checkout, fast-forward pull.
// ABOUTME: The credential-bearing URL is passed on the command line only, never stored.

use super::descriptor::{Descriptor, detect_descriptor};
use super::working_copy::WorkingCopy;
use crate::config::DeploymentRequest;
use crate::local::{self, LocalError, LocalOutput};
use secrecy::ExposeSecret;
use std::path::{Path, PathBuf};

/// Keeps git from ever asking for credentials on the terminal.
const GIT_ENV: [(&str, &str); 1] = [("GIT_TERMINAL_PROMPT", "0")];

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("git {action} failed (exit code {exit_code:?}):\n{output}")]
    Git {
        action: &'static str,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("branch '{branch}' cannot be fast-forwarded; local and remote history diverged:\n{output}")]
    FastForward { branch: String, output: String },

    #[error("no docker-compose.yml, compose.yml, or Dockerfile found in {0}")]
    MissingDescriptor(PathBuf),

    #[error(transparent)]
    Local(#[from] LocalError),
}

/// Result of a successful sync.
#[derive(Debug)]
pub struct Synced {
    pub working_copy: WorkingCopy,
    pub descriptor: Descriptor,
}

/// Replace every occurrence of the credential (raw or URL-encoded) with `***`.
pub fn scrub_credential(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    let encoded = urlencoding::encode(secret);
    text.replace(encoded.as_ref(), "***").replace(secret, "***")
}

/// Bring the working copy at `path` to the tip of `branch`.
///
/// `fetch_url` may carry a credential and is only handed to git as an
/// argument. `plain_url` is what the working copy's `origin` is set to, so the
/// credential never lands in `.git/config`, which is later copied to the host.
pub async fn checkout(
    fetch_url: &str,
    plain_url: &str,
    secret: &str,
    branch: &str,
    path: &Path,
) -> Result<(), SyncError> {
    if path.join(".git").is_dir() {
        update(fetch_url, plain_url, secret, branch, path).await
    } else {
        clone(fetch_url, plain_url, secret, branch, path).await
    }
}

async fn clone(
    fetch_url: &str,
    plain_url: &str,
    secret: &str,
    branch: &str,
    path: &Path,
) -> Result<(), SyncError> {
    tracing::info!("Cloning {} (branch {})", plain_url, branch);

    let target = path.to_string_lossy();
    let output = git(
        &[
            "clone",
            "--branch",
            branch,
            "--single-branch",
            fetch_url,
            target.as_ref(),
        ],
        None,
    )
    .await?;
    expect_success("clone", output, secret)?;

    let output = git(&["remote", "set-url", "origin", plain_url], Some(path)).await?;
    expect_success("remote set-url", output, secret)
}

async fn update(
    fetch_url: &str,
    plain_url: &str,
    secret: &str,
    branch: &str,
    path: &Path,
) -> Result<(), SyncError> {
    tracing::info!(
        "Updating existing working copy {} (branch {})",
        path.display(),
        branch
    );

    let output = git(&["remote", "set-url", "origin", plain_url], Some(path)).await?;
    expect_success("remote set-url", output, secret)?;

    let output = git(
        &[
            "fetch",
            "--tags",
            "--prune",
            fetch_url,
            "+refs/heads/*:refs/remotes/origin/*",
        ],
        Some(path),
    )
    .await?;
    expect_success("fetch", output, secret)?;

    let output = git(&["checkout", branch], Some(path)).await?;
    expect_success("checkout", output, secret)?;

    let output = git(&["pull", "--ff-only", fetch_url, branch], Some(path)).await?;
    if !output.success() {
        return Err(SyncError::FastForward {
            branch: branch.to_string(),
            output: scrub_credential(&output.combined(), secret),
        });
    }

    Ok(())
}

async fn git(args: &[&str], cwd: Option<&Path>) -> Result<LocalOutput, LocalError> {
    local::run("git", args, cwd, &GIT_ENV).await
}

fn expect_success(
    action: &'static str,
    output: LocalOutput,
    secret: &str,
) -> Result<(), SyncError> {
    if output.success() {
        return Ok(());
    }
    Err(SyncError::Git {
        action,
        exit_code: output.exit_code,
        output: scrub_credential(&output.combined(), secret),
    })
}

/// Sync the request's repository into its working copy and detect the descriptor.
///
/// Cleanup of the working copy is registered only after git succeeds, so a
/// failed sync leaves an existing copy in place for the next run to update.
pub async fn sync(request: &DeploymentRequest) -> Result<Synced, SyncError> {
    let path = request.working_copy_path();
    let secret = request.credential.expose_secret();
    let fetch_url = request.repository.authenticated(&request.credential);

    checkout(
        &fetch_url,
        request.repository.as_str(),
        secret,
        &request.branch,
        &path,
    )
    .await?;

    let working_copy = WorkingCopy::register(path);
    let descriptor = detect_descriptor(working_copy.path())?;

    Ok(Synced {
        working_copy,
        descriptor,
    })
}
