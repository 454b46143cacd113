// ABOUTME: Validated domain types shared by every deployment stage.
// ABOUTME: Repository URLs, application names, and container ports.

mod app_name;
mod port;
mod repo_url;

pub use app_name::{AppName, AppNameError};
pub use port::{ContainerPort, ContainerPortError};
pub use repo_url::{RepoUrl, RepoUrlError};
