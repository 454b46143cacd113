// ABOUTME: Remote environment provisioning: container engine, compose, nginx, curl.
// ABOUTME: Idempotent; safe to run against an already provisioned host.

use crate::config::RemoteLayout;
use crate::error::Result;
use crate::remote::{RemoteExecutor, RemoteScript, Step, quote};

const APT_PACKAGES: &str = "docker.io nginx curl openssh-client";
const RPM_PACKAGES: &str = "docker nginx curl openssh-clients";

/// Succeeds only when every tool the packages above provide is installed.
const TOOLS_PRESENT: &str =
    "command -v docker && command -v nginx && command -v curl && command -v scp && command -v ssh";

/// What the provisioner learned about the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    /// `"sudo "` for unprivileged users, empty for root.
    pub sudo: &'static str,
    /// How compose is invoked, if it is available at all.
    pub compose: Option<&'static str>,
}

impl HostProfile {
    /// Prefix `command` with sudo when needed.
    pub fn privileged(&self, command: &str) -> String {
        format!("{}{}", self.sudo, command)
    }

    pub fn docker(&self) -> String {
        self.privileged("docker")
    }

    /// Compose invocation with privilege prefix.
    pub fn compose(&self) -> Option<String> {
        self.compose.map(|c| self.privileged(c))
    }
}

/// Detect whether commands need sudo.
pub async fn detect_privilege<E>(executor: &E) -> Result<&'static str>
where
    E: RemoteExecutor + ?Sized,
{
    let output = executor.exec("id -u").await?;
    if output.success() && output.stdout.trim() == "0" {
        Ok("")
    } else {
        Ok("sudo ")
    }
}

/// Detect the compose invocation, preferring the docker plugin.
pub async fn detect_compose<E>(executor: &E, sudo: &str) -> Result<Option<&'static str>>
where
    E: RemoteExecutor + ?Sized,
{
    for candidate in ["docker compose", "docker-compose"] {
        let output = executor
            .exec(&format!("{}{} version", sudo, candidate))
            .await?;
        if output.success() {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn install_packages_step(sudo: &str) -> Step {
    Step::tolerated(
        "install packages",
        format!(
            "{s}apt-get update -y && {s}env DEBIAN_FRONTEND=noninteractive apt-get install -y {pkgs}",
            s = sudo,
            pkgs = APT_PACKAGES
        ),
    )
    .or_else(format!(
        "if command -v dnf >/dev/null 2>&1; then {s}dnf install -y {pkgs}; else {s}yum install -y {pkgs}; fi",
        s = sudo,
        pkgs = RPM_PACKAGES
    ))
}

fn install_compose_step(sudo: &str) -> Step {
    Step::tolerated(
        "install compose",
        format!(
            "{s}env DEBIAN_FRONTEND=noninteractive apt-get install -y docker-compose-v2 || {s}env DEBIAN_FRONTEND=noninteractive apt-get install -y docker-compose",
            s = sudo
        ),
    )
    .or_else(format!(
        "if command -v dnf >/dev/null 2>&1; then {s}dnf install -y docker-compose-plugin || {s}dnf install -y docker-compose; else {s}yum install -y docker-compose-plugin || {s}yum install -y docker-compose; fi",
        s = sudo
    ))
}

/// Build the provisioning script.
///
/// `packages_present` skips the package manager entirely; `compose_present`
/// skips the compose install.
pub fn provision_script(
    sudo: &str,
    user: &str,
    layout: &RemoteLayout,
    packages_present: bool,
    compose_present: bool,
) -> RemoteScript {
    let mut script = RemoteScript::new("provision");

    if !packages_present {
        script.push(install_packages_step(sudo));
    }
    if !compose_present {
        script.push(install_compose_step(sudo));
    }

    let user = quote(user);
    let base_dir = quote(&layout.base_dir);

    script
        .step(Step::fatal("verify docker", "command -v docker"))
        .step(Step::fatal(
            "docker group membership",
            format!(
                "id -nG {u} | grep -qw docker || {s}usermod -aG docker {u}",
                u = user,
                s = sudo
            ),
        ))
        .step(Step::tolerated(
            "enable docker",
            format!("{}systemctl enable --now docker", sudo),
        ))
        .step(Step::tolerated(
            "enable nginx",
            format!("{}systemctl enable --now nginx", sudo),
        ))
        .step(Step::fatal(
            "create base directory",
            format!(
                "{s}mkdir -p {d} && {s}chown {u}: {d}",
                s = sudo,
                d = base_dir,
                u = user
            ),
        ))
}

/// Install and enable everything a deployment needs on the remote host.
pub async fn provision<E>(executor: &E, user: &str, layout: &RemoteLayout) -> Result<HostProfile>
where
    E: RemoteExecutor + ?Sized,
{
    let sudo = detect_privilege(executor).await?;
    if sudo.is_empty() {
        tracing::info!("Connected as root; commands run without sudo");
    }

    let packages_present = executor.exec(TOOLS_PRESENT).await?.success();
    if packages_present {
        tracing::info!("docker, nginx, curl and the OpenSSH client already installed");
    }
    let compose_present = detect_compose(executor, sudo).await?.is_some();

    provision_script(sudo, user, layout, packages_present, compose_present)
        .run(executor)
        .await?;

    let compose = detect_compose(executor, sudo).await?;
    match compose {
        Some(c) => tracing::info!("Using '{}' for compose", c),
        None => tracing::warn!("No compose tool found on the host"),
    }

    let profile = HostProfile { sudo, compose };
    log_versions(executor, &profile).await?;
    Ok(profile)
}

async fn log_versions<E>(executor: &E, profile: &HostProfile) -> Result<()>
where
    E: RemoteExecutor + ?Sized,
{
    let mut script = RemoteScript::new("versions")
        .step(Step::tolerated("docker version", "docker --version"))
        .step(Step::tolerated("nginx version", "nginx -v"));
    if let Some(compose) = profile.compose {
        script.push(Step::tolerated(
            "compose version",
            format!("{}{} version", profile.sudo, compose),
        ));
    }

    let report = script.run(executor).await?;
    for (name, outcome) in &report.outcomes {
        let text = outcome.output().lines().next().unwrap_or("unavailable");
        tracing::info!("{}: {}", name, text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FailurePolicy;

    #[test]
    fn fresh_host_installs_everything() {
        let script = provision_script("sudo ", "deploy", &RemoteLayout::default(), false, false);
        let names: Vec<_> = script.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "install packages",
                "install compose",
                "verify docker",
                "docker group membership",
                "enable docker",
                "enable nginx",
                "create base directory",
            ]
        );
    }

    #[test]
    fn presence_check_covers_every_installed_tool() {
        for tool in ["docker", "nginx", "curl", "scp", "ssh"] {
            assert!(TOOLS_PRESENT.contains(&format!("command -v {tool}")));
        }
    }

    #[test]
    fn provisioned_host_skips_package_manager() {
        let script = provision_script("sudo ", "deploy", &RemoteLayout::default(), true, true);
        assert!(
            script
                .steps()
                .iter()
                .all(|s| !s.command.contains("apt-get"))
        );
    }

    #[test]
    fn package_install_falls_back_to_rpm_family() {
        let step = install_packages_step("sudo ");
        assert_eq!(step.policy, FailurePolicy::Tolerated);
        assert!(step.command.contains("apt-get install -y docker.io"));
        let fallback = step.fallback.unwrap();
        assert!(fallback.contains("dnf install -y docker"));
        assert!(fallback.contains("yum install -y docker"));
    }

    #[test]
    fn service_enable_is_best_effort() {
        let script = provision_script("", "root", &RemoteLayout::default(), true, true);
        for step in script.steps().iter().filter(|s| s.name.starts_with("enable")) {
            assert_eq!(step.policy, FailurePolicy::Tolerated);
            assert!(step.command.starts_with("systemctl"));
        }
    }

    #[test]
    fn group_membership_is_idempotent() {
        let script = provision_script("sudo ", "deploy", &RemoteLayout::default(), true, true);
        let step = script
            .steps()
            .iter()
            .find(|s| s.name == "docker group membership")
            .unwrap();
        assert_eq!(
            step.command,
            "id -nG 'deploy' | grep -qw docker || sudo usermod -aG docker 'deploy'"
        );
    }

    #[test]
    fn profile_prefixes_sudo() {
        let profile = HostProfile {
            sudo: "sudo ",
            compose: Some("docker compose"),
        };
        assert_eq!(profile.docker(), "sudo docker");
        assert_eq!(profile.compose().unwrap(), "sudo docker compose");

        let root = HostProfile {
            sudo: "",
            compose: None,
        };
        assert_eq!(root.docker(), "docker");
        assert!(root.compose().is_none());
    }
}
