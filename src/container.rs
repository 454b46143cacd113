// ABOUTME: Container lifecycle on the host: stop the previous instance, build and start the new one.
// ABOUTME: Finds the running container by name substring and checks it reports "Up".

use crate::config::Timings;
use crate::error::Result;
use crate::provision::HostProfile;
use crate::remote::{RemoteExecutor, RemoteScript, Step, quote};
use crate::source::Descriptor;
use crate::types::{AppName, ContainerPort};
use serde::Deserialize;

/// Log lines shown after a successful start.
pub const START_LOG_LINES: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("no running container matching '{filter}'\n{listing}")]
    NotRunning { filter: String, listing: String },

    #[error("container '{name}' is not up (status: {status})\n{listing}")]
    NotUp {
        name: String,
        status: String,
        listing: String,
    },

    #[error("a compose file was found but neither 'docker compose' nor 'docker-compose' is available")]
    ComposeUnavailable,
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Names")]
    pub names: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl ContainerSummary {
    pub fn is_up(&self) -> bool {
        self.status.starts_with("Up")
    }
}

/// Parse `docker ps` JSON lines, skipping anything that is not a container record.
pub fn parse_listing(stdout: &str) -> Vec<ContainerSummary> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::debug!("Skipping unparseable docker ps line: {}", e);
                None
            }
        })
        .collect()
}

/// What the lifecycle manager needs to know about this release.
pub struct Lifecycle<'a> {
    pub app: &'a AppName,
    pub release_dir: &'a str,
    pub port: ContainerPort,
    pub profile: &'a HostProfile,
}

impl Lifecycle<'_> {
    /// Commands that stop the previous instance and start the new one.
    pub fn start_script(&self, descriptor: &Descriptor) -> Result<RemoteScript> {
        let dir = quote(self.release_dir);
        let script = RemoteScript::new("container");

        let script = match descriptor {
            Descriptor::Compose { file } => {
                let compose = self
                    .profile
                    .compose()
                    .ok_or(ContainerError::ComposeUnavailable)?;
                let project = quote(&self.app.container_filter());
                let file = quote(file);
                script
                    .step(Step::tolerated(
                        "stop previous containers",
                        format!(
                            "cd {} && {} -p {} -f {} down --remove-orphans",
                            dir, compose, project, file
                        ),
                    ))
                    .step(Step::fatal(
                        "build and start containers",
                        format!(
                            "cd {} && {} -p {} -f {} up -d --build --remove-orphans",
                            dir, compose, project, file
                        ),
                    ))
            }
            Descriptor::Dockerfile => {
                let docker = self.profile.docker();
                let name = quote(&self.app.container_filter());
                let port = self.port.get();
                script
                    .step(Step::tolerated(
                        "remove previous container",
                        format!("{} rm -f {}", docker, name),
                    ))
                    .step(Step::fatal(
                        "build image",
                        format!("cd {} && {} build -t {} .", dir, docker, name),
                    ))
                    .step(Step::fatal(
                        "start container",
                        format!(
                            "{d} run -d --name {n} --restart unless-stopped -p 127.0.0.1:{p}:{p} {n}",
                            d = docker,
                            n = name,
                            p = port
                        ),
                    ))
            }
        };
        Ok(script)
    }
}

/// First container whose name contains the app's filter, if any.
pub async fn find<E>(
    executor: &E,
    profile: &HostProfile,
    app: &AppName,
) -> Result<Option<ContainerSummary>>
where
    E: RemoteExecutor + ?Sized,
{
    let filter = app.container_filter();
    let output = executor
        .exec(&format!(
            "{} ps --filter name={} --format '{{{{json .}}}}'",
            profile.docker(),
            quote(&filter)
        ))
        .await?;

    Ok(parse_listing(&output.stdout)
        .into_iter()
        .find(|c| c.names.contains(&filter)))
}

/// Resolve the app's container and require it to be up.
///
/// On failure the full `docker ps -a` listing is logged and attached to the error.
pub async fn require_running<E>(
    executor: &E,
    profile: &HostProfile,
    app: &AppName,
) -> Result<ContainerSummary>
where
    E: RemoteExecutor + ?Sized,
{
    let found = match find(executor, profile, app).await? {
        Some(container) if container.is_up() => {
            tracing::info!(
                "Container {} ({}) is {}",
                container.names,
                container.id,
                container.status
            );
            return Ok(container);
        }
        other => other,
    };

    let listing = executor
        .exec(&format!("{} ps -a", profile.docker()))
        .await?
        .combined();
    tracing::error!("Container listing:\n{}", listing);

    let err = match found {
        Some(container) => ContainerError::NotUp {
            name: container.names,
            status: container.status,
            listing,
        },
        None => ContainerError::NotRunning {
            filter: app.container_filter(),
            listing,
        },
    };
    Err(err.into())
}

/// Last `lines` lines of the container's log, stdout and stderr merged.
pub async fn log_tail<E>(
    executor: &E,
    profile: &HostProfile,
    container: &ContainerSummary,
    lines: u32,
) -> Result<String>
where
    E: RemoteExecutor + ?Sized,
{
    let output = executor
        .exec(&format!(
            "{} logs --tail {} {} 2>&1",
            profile.docker(),
            lines,
            quote(&container.names)
        ))
        .await?;
    Ok(output.combined())
}

/// Stop the old instance, start the new one, and confirm it is up.
pub async fn deploy<E>(
    executor: &E,
    lifecycle: &Lifecycle<'_>,
    descriptor: &Descriptor,
    timings: &Timings,
) -> Result<ContainerSummary>
where
    E: RemoteExecutor + ?Sized,
{
    let report = lifecycle.start_script(descriptor)?.run(executor).await?;
    if !report.tolerated_failures().is_empty() {
        tracing::info!("No previous instance was stopped (first deployment?)");
    }

    if !timings.post_start_grace.is_zero() {
        tracing::info!(
            "Waiting {:?} for the container to settle",
            timings.post_start_grace
        );
        tokio::time::sleep(timings.post_start_grace).await;
    }

    let container = require_running(executor, lifecycle.profile, lifecycle.app).await?;
    let logs = log_tail(executor, lifecycle.profile, &container, START_LOG_LINES).await?;
    tracing::info!("Last {} log lines of {}:\n{}", START_LOG_LINES, container.names, logs);
    Ok(container)
}
