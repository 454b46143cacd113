// ABOUTME: SSH transport for running commands on the deployment target.
// ABOUTME: Key-based authentication with known_hosts verification and output streaming.

mod client;
mod error;

pub use client::{CommandOutput, REMOTE_TARGET, Session, SessionConfig};
pub use error::{Error, Result};
