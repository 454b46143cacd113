// ABOUTME: nginx reverse proxy rule for the deployed application.
// ABOUTME: Renders the server block, installs it, validates with nginx -t, then reloads.

use crate::config::RemoteLayout;
use crate::error::Result;
use crate::provision::HostProfile;
use crate::remote::{RemoteExecutor, RemoteScript, Step, quote};
use crate::types::{AppName, ContainerPort};

/// Render the server block forwarding port 80 to the container on loopback.
pub fn render_rule(app: &AppName, port: ContainerPort) -> String {
    format!(
        r#"# Managed by gangway for {app}
server {{
    listen 80;
    server_name _;

    location / {{
        proxy_pass http://127.0.0.1:{port};
        proxy_http_version 1.1;

        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_set_header X-Forwarded-Host $host;
        proxy_cache_bypass $http_upgrade;

        add_header X-Frame-Options "SAMEORIGIN" always;
        add_header X-Content-Type-Options "nosniff" always;
        add_header X-XSS-Protection "1; mode=block" always;
    }}
}}
"#,
        app = app,
        port = port.get()
    )
}

/// Install the rule for `app` and reload nginx if the configuration is valid.
///
/// The rule file is always overwritten. The activation link is created only
/// when missing. A failed `nginx -t` aborts before the reload, so the running
/// proxy keeps serving its previous configuration.
pub fn configure_script(
    app: &AppName,
    port: ContainerPort,
    layout: &RemoteLayout,
    profile: &HostProfile,
) -> RemoteScript {
    let rule = quote(&layout.proxy_rule_path(app));
    let link = quote(&layout.proxy_link_path(app));
    let available = quote(&layout.nginx_available);
    let enabled = quote(&layout.nginx_enabled);
    let sudo = profile.sudo;

    RemoteScript::new("proxy")
        .step(Step::fatal(
            "create site directories",
            format!("{}mkdir -p {} {}", sudo, available, enabled),
        ))
        .step(Step::fatal(
            "write proxy rule",
            format!(
                "printf '%s' {} | {}tee {} > /dev/null",
                quote(&render_rule(app, port)),
                sudo,
                rule
            ),
        ))
        .step(Step::fatal(
            "enable proxy rule",
            format!("[ -L {l} ] || {s}ln -s {r} {l}", l = link, r = rule, s = sudo),
        ))
        .step(Step::fatal(
            "disable default site",
            format!("{}rm -f {}", sudo, quote(&layout.default_site_link())),
        ))
        .step(Step::fatal("check nginx configuration", format!("{}nginx -t", sudo)))
        .step(
            Step::fatal("reload nginx", format!("{}systemctl reload nginx", sudo))
                .or_else(format!("{}nginx -s reload", sudo)),
        )
}

pub async fn configure<E>(
    executor: &E,
    app: &AppName,
    port: ContainerPort,
    layout: &RemoteLayout,
    profile: &HostProfile,
) -> Result<()>
where
    E: RemoteExecutor + ?Sized,
{
    configure_script(app, port, layout, profile)
        .run(executor)
        .await?;
    tracing::info!(
        "nginx forwards port 80 to 127.0.0.1:{} for {}",
        port,
        app
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> AppName {
        AppName::new("widgets").unwrap()
    }

    #[test]
    fn rule_forwards_to_loopback_port() {
        let rule = render_rule(&app(), ContainerPort::new(8080).unwrap());
        assert!(rule.contains("listen 80;"));
        assert!(rule.contains("proxy_pass http://127.0.0.1:8080;"));
        assert!(rule.contains("proxy_set_header Upgrade $http_upgrade;"));
        assert!(rule.contains("X-Forwarded-Proto"));
        assert!(rule.contains("X-Content-Type-Options"));
    }

    #[test]
    fn syntax_check_precedes_reload() {
        let profile = HostProfile {
            sudo: "sudo ",
            compose: None,
        };
        let script = configure_script(
            &app(),
            ContainerPort::new(8080).unwrap(),
            &RemoteLayout::default(),
            &profile,
        );
        let names: Vec<_> = script.steps().iter().map(|s| s.name.as_str()).collect();
        let check = names.iter().position(|n| *n == "check nginx configuration");
        let reload = names.iter().position(|n| *n == "reload nginx");
        assert!(check.unwrap() < reload.unwrap());
    }

    #[test]
    fn link_is_created_only_when_absent() {
        let profile = HostProfile {
            sudo: "",
            compose: None,
        };
        let script = configure_script(
            &app(),
            ContainerPort::new(8080).unwrap(),
            &RemoteLayout::default(),
            &profile,
        );
        let link = script
            .steps()
            .iter()
            .find(|s| s.name == "enable proxy rule")
            .unwrap();
        assert_eq!(
            link.command,
            "[ -L '/etc/nginx/sites-enabled/widgets' ] || ln -s '/etc/nginx/sites-available/widgets' '/etc/nginx/sites-enabled/widgets'"
        );
    }
}
