// ABOUTME: Library root for gangway - exposes the deployment pipeline for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod container;
pub mod diagnostics;
pub mod error;
pub mod flow;
pub mod local;
pub mod logging;
pub mod provision;
pub mod proxy;
pub mod release;
pub mod remote;
pub mod source;
pub mod ssh;
pub mod types;
pub mod validate;
