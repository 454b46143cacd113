// ABOUTME: Interactive parameter collection for deploy and teardown runs.
// ABOUTME: Re-prompts until each answer validates; the credential is read without echo.

use super::target::{RemoteTarget, prepare_key};
use super::{DEFAULT_BRANCH, DeploymentRequest, RemoteLayout, TeardownRequest, Timings};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::types::{AppName, ContainerPort, RepoUrl};
use secrecy::SecretString;
use std::path::{Path, PathBuf};

/// Source of answers for the collector.
pub trait Prompter {
    /// Read a visible line of input. Empty answers are allowed.
    fn input(&mut self, prompt: &str) -> Result<String>;

    /// Read a line without echoing it.
    fn secret(&mut self, prompt: &str) -> Result<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        let answer = dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }

    fn secret(&mut self, prompt: &str) -> Result<String> {
        let answer = dialoguer::Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(answer)
    }
}

/// Ask until `parse` accepts the answer.
fn ask_until<P, T, F>(prompter: &mut P, prompt: &str, mut parse: F) -> Result<T>
where
    P: Prompter + ?Sized,
    F: FnMut(&str) -> std::result::Result<T, String>,
{
    loop {
        let answer = prompter.input(prompt)?;
        match parse(answer.trim()) {
            Ok(value) => return Ok(value),
            Err(reason) => tracing::error!("{}", reason),
        }
    }
}

fn non_empty(what: &'static str) -> impl FnMut(&str) -> std::result::Result<String, String> {
    move |s| {
        if s.is_empty() {
            Err(format!("{} cannot be empty", what))
        } else {
            Ok(s.to_string())
        }
    }
}

fn key_path(s: &str) -> std::result::Result<PathBuf, String> {
    if s.is_empty() {
        return Err("SSH key path cannot be empty".to_string());
    }
    prepare_key(Path::new(s)).map_err(|e| e.to_string())
}

fn collect_remote<P>(prompter: &mut P) -> Result<RemoteTarget>
where
    P: Prompter + ?Sized,
{
    let user = ask_until(prompter, "Remote username", non_empty("username"))?;
    let host = ask_until(prompter, "Remote host address", non_empty("host"))?;
    let key_path = ask_until(prompter, "Path to SSH private key", key_path)?;
    Ok(RemoteTarget::new(user, host, key_path))
}

/// Collect a deployment request interactively.
///
/// Prompt order: repository URL, credential, branch, remote user, host, SSH
/// key path, container port.
pub fn collect_deployment<P>(
    prompter: &mut P,
    run_id: &str,
    workspace: &Path,
    diag: &mut Diagnostics,
) -> Result<DeploymentRequest>
where
    P: Prompter + ?Sized,
{
    let repository = ask_until(prompter, "Git repository URL (https://...git)", |s| {
        RepoUrl::parse(s).map_err(|e| e.to_string())
    })?;
    tracing::info!("Application name: {}", repository.app_name());

    let credential = prompter.secret("Access token (leave empty for public repositories)")?;
    if credential.is_empty() {
        diag.warn(Warning::empty_credential());
    }
    let credential = SecretString::from(credential);

    let branch = prompter.input(&format!("Branch [{}]", DEFAULT_BRANCH))?;
    let branch = match branch.trim() {
        "" => DEFAULT_BRANCH.to_string(),
        b => b.to_string(),
    };

    let remote = collect_remote(prompter)?;

    let container_port = ask_until(prompter, "Application port inside the container", |s| {
        s.parse::<ContainerPort>().map_err(|e| e.to_string())
    })?;

    Ok(DeploymentRequest {
        repository,
        credential,
        branch,
        remote,
        container_port,
        workspace: workspace.to_path_buf(),
        layout: RemoteLayout::default(),
        timings: Timings::default(),
        run_id: run_id.to_string(),
    })
}

/// Collect a teardown request interactively.
///
/// Prompt order: remote user, host, SSH key path, project name.
pub fn collect_teardown<P>(prompter: &mut P) -> Result<TeardownRequest>
where
    P: Prompter + ?Sized,
{
    let remote = collect_remote(prompter)?;
    let app_name = ask_until(prompter, "Project name to tear down", |s| {
        AppName::new(s).map_err(|e| e.to_string())
    })?;

    Ok(TeardownRequest {
        remote,
        app_name,
        layout: RemoteLayout::default(),
        timings: Timings::default(),
    })
}
