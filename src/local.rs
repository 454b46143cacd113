// ABOUTME: Local subprocess execution for the git and scp clients.
// ABOUTME: Resolves tools on PATH and captures their output for the run log.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Local tools a deployment cannot run without.
pub const REQUIRED_TOOLS: [&str; 2] = ["git", "scp"];

#[derive(Debug, thiserror::Error)]
pub enum LocalError {
    #[error("required local tool '{0}' was not found on PATH")]
    MissingTool(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Find an executable by name in `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Fail unless every tool in `tools` is on `PATH`.
pub fn require_tools(tools: &[&str]) -> Result<(), LocalError> {
    for tool in tools {
        match find_on_path(tool) {
            Some(path) => tracing::debug!("Found {} at {}", tool, path.display()),
            None => return Err(LocalError::MissingTool(tool.to_string())),
        }
    }
    Ok(())
}

/// A finished local command.
#[derive(Debug)]
pub struct LocalOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl LocalOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

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

impl From<Output> for LocalOutput {
    fn from(output: Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Run `program` with `args`, optionally inside `cwd`, capturing its output.
///
/// Stdin is closed so a tool can never block waiting for a prompt.
pub async fn run<I, S>(
    program: &str,
    args: I,
    cwd: Option<&Path>,
    envs: &[(&str, &str)],
) -> Result<LocalOutput, LocalError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|source| LocalError::Spawn {
        program: program.to_string(),
        source,
    })?;
    let output = LocalOutput::from(output);

    if output.success() {
        tracing::debug!("{} exited successfully", program);
    } else {
        tracing::debug!("{} exited with {:?}", program, output.exit_code);
    }

    Ok(output)
}
