// ABOUTME: Orchestrates the deploy and teardown flows end to end.
// ABOUTME: Each stage completes before the next starts; the first fatal error ends the run.

use crate::config::{DeploymentRequest, RemoteLayout, RemoteTarget, TeardownRequest, Timings};
use crate::container::{self, Lifecycle};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::local::{self, REQUIRED_TOOLS};
use crate::provision::{self, HostProfile};
use crate::proxy;
use crate::release::{self, Scp, Uploader};
use crate::remote::{RemoteExecutor, RemoteScript, Step, quote};
use crate::source::{self, Descriptor};
use crate::ssh::Session;
use crate::types::AppName;
use crate::validate;
use std::path::Path;

/// Open a session and prove it can run commands.
pub async fn connect(target: &RemoteTarget, timings: &Timings) -> Result<Session> {
    tracing::info!(
        "Connecting to {}:{}",
        target.destination(),
        target.port
    );
    let session = Session::connect(target.session_config(timings)).await?;
    session.probe().await?;
    tracing::info!("Connected to {}", target.host);
    Ok(session)
}

async fn disconnect(session: Session, diagnostics: &mut Diagnostics) {
    if let Err(e) = session.disconnect().await {
        diagnostics.warn(Warning::ssh_disconnect(format!(
            "Failed to disconnect cleanly: {}",
            e
        )));
    }
}

/// Full deployment: sync, connect, provision, release, start, proxy, validate.
pub async fn deploy(request: &DeploymentRequest, diagnostics: &mut Diagnostics) -> Result<()> {
    local::require_tools(&REQUIRED_TOOLS)?;

    let synced = source::sync(request).await?;
    match &synced.descriptor {
        Descriptor::Compose { file } => tracing::info!("Using {}", file),
        Descriptor::Dockerfile => diagnostics.warn(Warning::degraded_descriptor(
            "No compose file found; building and running the Dockerfile as a single container",
        )),
    }

    let session = connect(&request.remote, &request.timings).await?;
    let uploader = Scp::new(&request.remote, request.timings.connect_timeout);
    let result = deploy_remote(
        &session,
        &uploader,
        request,
        synced.working_copy.path(),
        &synced.descriptor,
    )
    .await;
    disconnect(session, diagnostics).await;
    result?;

    validate::check_external(
        &request.remote.host,
        request.timings.external_timeout,
        diagnostics,
    )
    .await;

    tracing::info!("Deployment complete: http://{}/", request.remote.host);
    Ok(())
}

/// Every deployment stage that runs on the host.
pub async fn deploy_remote<E, U>(
    executor: &E,
    uploader: &U,
    request: &DeploymentRequest,
    working_copy: &Path,
    descriptor: &Descriptor,
) -> Result<HostProfile>
where
    E: RemoteExecutor + ?Sized,
    U: Uploader + ?Sized,
{
    let app = request.app_name();
    let layout = &request.layout;

    let profile = provision::provision(executor, &request.remote.user, layout).await?;

    let staging = layout.staging_dir(app, &request.run_id);
    let release_dir = layout.release_dir(app);
    release::release(
        executor,
        uploader,
        working_copy,
        &staging,
        &release_dir,
        profile.sudo,
    )
    .await?;

    let lifecycle = Lifecycle {
        app,
        release_dir: &release_dir,
        port: request.container_port,
        profile: &profile,
    };
    container::deploy(executor, &lifecycle, descriptor, &request.timings).await?;

    proxy::configure(executor, app, request.container_port, layout, &profile).await?;

    validate::validate_remote(
        executor,
        &profile,
        app,
        request.container_port,
        &request.timings,
    )
    .await?;

    Ok(profile)
}

/// Remove the app's containers, release directory and proxy rule.
///
/// Every step is best-effort, so tearing down something that was never
/// deployed succeeds.
pub fn teardown_script(app: &AppName, layout: &RemoteLayout, profile: &HostProfile) -> RemoteScript {
    let release_dir = quote(&layout.release_dir(app));
    let sudo = profile.sudo;
    let mut script = RemoteScript::new("teardown");

    let name = quote(&app.container_filter());
    let docker = profile.docker();

    if let Some(compose) = profile.compose() {
        script.push(Step::tolerated(
            "stop compose project",
            format!(
                "cd {} && {} -p {} down --remove-orphans",
                release_dir, compose, name
            ),
        ));
    }

    // Only Dockerfile deployments leave a container with exactly this name.
    script
        .step(Step::tolerated(
            "remove container",
            format!(
                "if {d} container inspect {n} >/dev/null 2>&1; then {d} rm -f {n}; fi",
                d = docker,
                n = name
            ),
        ))
        .step(Step::tolerated(
            "remove release directory",
            format!("{}rm -rf {}", sudo, release_dir),
        ))
        .step(Step::tolerated(
            "remove proxy rule",
            format!(
                "{}rm -f {} {}",
                sudo,
                quote(&layout.proxy_rule_path(app)),
                quote(&layout.proxy_link_path(app))
            ),
        ))
        .step(Step::tolerated(
            "reload nginx",
            format!("{s}nginx -t && {s}systemctl reload nginx", s = sudo),
        ))
}

/// Teardown stages that run on the host.
pub async fn teardown_remote<E>(
    executor: &E,
    request: &TeardownRequest,
    diagnostics: &mut Diagnostics,
) -> Result<()>
where
    E: RemoteExecutor + ?Sized,
{
    let sudo = provision::detect_privilege(executor).await?;
    let compose = provision::detect_compose(executor, sudo).await?;
    let profile = HostProfile { sudo, compose };

    let report = teardown_script(&request.app_name, &request.layout, &profile)
        .run(executor)
        .await?;
    for (name, outcome) in &report.outcomes {
        if !outcome.succeeded() {
            diagnostics.warn(Warning::teardown_step(format!(
                "{} did not complete (nothing to remove?)",
                name
            )));
        }
    }
    Ok(())
}

/// Remove a deployment from the host. Only connection failures are fatal.
pub async fn teardown(request: &TeardownRequest, diagnostics: &mut Diagnostics) -> Result<()> {
    let session = connect(&request.remote, &request.timings).await?;
    let result = teardown_remote(&session, request, diagnostics).await;
    disconnect(session, diagnostics).await;
    result?;

    tracing::info!("Teardown of {} complete", request.app_name);
    Ok(())
}

/// Log the warnings collected during the run.
pub fn summarize(diagnostics: &Diagnostics) {
    if !diagnostics.has_warnings() {
        return;
    }
    tracing::warn!("Completed with {} warning(s):", diagnostics.warnings().len());
    for warning in diagnostics.warnings() {
        tracing::warn!("  - {}", warning.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FailurePolicy;

    #[test]
    fn teardown_never_aborts() {
        let app = AppName::new("widgets").unwrap();
        let profile = HostProfile {
            sudo: "sudo ",
            compose: Some("docker compose"),
        };
        let script = teardown_script(&app, &RemoteLayout::default(), &profile);
        assert_eq!(script.steps().len(), 5);
        assert!(
            script
                .steps()
                .iter()
                .all(|s| s.policy == FailurePolicy::Tolerated)
        );
        assert_eq!(
            script.steps()[0].command,
            "cd '/opt/apps/widgets' && sudo docker compose -p 'widgets' down --remove-orphans"
        );
    }

    #[test]
    fn teardown_without_compose_still_removes_container() {
        let app = AppName::new("widgets").unwrap();
        let profile = HostProfile {
            sudo: "",
            compose: None,
        };
        let script = teardown_script(&app, &RemoteLayout::default(), &profile);
        assert_eq!(
            script.steps()[0].command,
            "if docker container inspect 'widgets' >/dev/null 2>&1; then docker rm -f 'widgets'; fi"
        );
    }

    #[test]
    fn teardown_uses_normalized_project_name() {
        let app = AppName::new("site.io").unwrap();
        let profile = HostProfile {
            sudo: "",
            compose: Some("docker-compose"),
        };
        let script = teardown_script(&app, &RemoteLayout::default(), &profile);
        assert_eq!(
            script.steps()[0].command,
            "cd '/opt/apps/site.io' && docker-compose -p 'siteio' down --remove-orphans"
        );
        assert!(script.steps()[1].command.contains("rm -f 'siteio'"));
    }
}
