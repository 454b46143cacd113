// ABOUTME: Test support utilities.
// ABOUTME: A scripted fake remote host, a recording uploader, and local git fixtures.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use gangway::config::{DeploymentRequest, RemoteLayout, RemoteTarget, Timings};
use gangway::release::{TransferError, Uploader};
use gangway::remote::RemoteExecutor;
use gangway::ssh::{self, CommandOutput};
use gangway::types::{ContainerPort, RepoUrl};
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("gangway=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn fail(exit_code: u32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// `docker ps --format '{{json .}}'` line for a container.
pub fn ps_line(name: &str, status: &str) -> String {
    format!(
        r#"{{"ID":"f00dfeed","Image":"{name}","Names":"{name}","Status":"{status}"}}"#
    )
}

enum Reply {
    Output(CommandOutput),
    Disconnected,
}

struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

/// A remote host that answers commands from scripted rules.
///
/// The most recently added rule whose pattern is a substring of the command
/// answers it. Each rule replays its replies in order and repeats the last one.
/// Commands matching no rule succeed with empty output.
#[derive(Default)]
pub struct FakeHost {
    rules: Mutex<Vec<Rule>>,
    commands: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provisioned host where the app's container is up and answers 200.
    pub fn healthy(container: &str) -> Self {
        let host = Self::new();
        host.on("ps --filter name=", [ok(&ps_line(container, "Up 5 seconds"))]);
        host.on("curl", [ok("200")]);
        host
    }

    pub fn on<I>(&self, pattern: &str, replies: I) -> &Self
    where
        I: IntoIterator<Item = CommandOutput>,
    {
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            replies: replies.into_iter().map(Reply::Output).collect(),
        });
        self
    }

    /// Fail the transport for commands matching `pattern`.
    pub fn drop_connection_on(&self, pattern: &str) -> &Self {
        self.rules.lock().push(Rule {
            pattern: pattern.to_string(),
            replies: VecDeque::from([Reply::Disconnected]),
        });
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.count(pattern) > 0
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// Index of the first command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.commands.lock().iter().position(|c| c.contains(pattern))
    }
}

#[async_trait]
impl RemoteExecutor for FakeHost {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        self.commands.lock().push(command.to_string());

        let mut rules = self.rules.lock();
        let Some(rule) = rules
            .iter_mut()
            .rev()
            .find(|r| command.contains(&r.pattern))
        else {
            return Ok(ok(""));
        };

        let reply = if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            None
        };
        let reply = reply.as_ref().or(rule.replies.front());

        match reply {
            Some(Reply::Output(output)) => Ok(output.clone()),
            Some(Reply::Disconnected) => Err(ssh::Error::ChannelClosed),
            None => Ok(ok("")),
        }
    }
}

/// Records uploads instead of running scp.
#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
    pub fail: bool,
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, local: &Path, remote_dir: &str) -> Result<(), TransferError> {
        self.uploads
            .lock()
            .push((local.to_path_buf(), remote_dir.to_string()));
        if self.fail {
            return Err(TransferError::Scp {
                destination: remote_dir.to_string(),
                exit_code: Some(1),
                output: "lost connection".to_string(),
            });
        }
        Ok(())
    }
}

/// Deployment request for `widgets` on a documentation-range host.
pub fn request(workspace: &Path) -> DeploymentRequest {
    DeploymentRequest {
        repository: RepoUrl::parse("https://example.com/group/widgets.git").unwrap(),
        credential: SecretString::from("token".to_string()),
        branch: "main".to_string(),
        remote: RemoteTarget::new("deploy", "203.0.113.10", workspace.join("id_ed25519")),
        container_port: ContainerPort::new(8080).unwrap(),
        workspace: workspace.to_path_buf(),
        layout: RemoteLayout::default(),
        timings: Timings::immediate(),
        run_id: "20261018-120000".to_string(),
    }
}

/// Run git in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("git should be installed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Create a repository on branch `main` with `files` committed.
pub fn origin_repo(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let repo = dir.join("origin");
    std::fs::create_dir_all(&repo).unwrap();
    git(&repo, &["init", "-q", "-b", "main"]);
    commit(&repo, files, "initial");
    repo
}

/// Write `files` into `repo` and commit them.
pub fn commit(repo: &Path, files: &[(&str, &str)], message: &str) {
    for (name, content) in files {
        std::fs::write(repo.join(name), content).unwrap();
    }
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", message]);
}
