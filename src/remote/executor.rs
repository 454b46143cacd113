// ABOUTME: Transport-agnostic trait for running a command on the remote host.
// ABOUTME: Implemented by the SSH session and by scripted fakes in tests.

use crate::ssh::{self, CommandOutput, Session};
use async_trait::async_trait;

/// Runs one command on the deployment target and returns its captured output.
///
/// A non-zero exit status is reported through [`CommandOutput`], not as an
/// error. Errors mean the transport itself failed.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput>;
}

#[async_trait]
impl RemoteExecutor for Session {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        Session::exec(self, command).await
    }
}

/// Quote a value for a POSIX shell using single quotes.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
