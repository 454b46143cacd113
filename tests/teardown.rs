// ABOUTME: Integration tests for the teardown flow against a scripted host.
// ABOUTME: Teardown must succeed whether or not anything was deployed.

mod support;

use gangway::config::{RemoteLayout, RemoteTarget, TeardownRequest, Timings};
use gangway::diagnostics::{Diagnostics, WarningKind};
use gangway::error::Error;
use gangway::flow;
use gangway::types::AppName;
use std::path::PathBuf;
use support::{FakeHost, fail, ok};

fn request() -> TeardownRequest {
    TeardownRequest {
        remote: RemoteTarget::new("deploy", "203.0.113.10", PathBuf::from("/keys/id")),
        app_name: AppName::new("widgets").unwrap(),
        layout: RemoteLayout::default(),
        timings: Timings::immediate(),
    }
}

#[tokio::test]
async fn removes_everything_for_the_app() {
    let host = FakeHost::new();
    let mut diagnostics = Diagnostics::default();

    flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap();

    assert!(host.ran(
        "cd '/opt/apps/widgets' && sudo docker compose -p 'widgets' down --remove-orphans"
    ));
    assert!(host.ran(
        "if sudo docker container inspect 'widgets' >/dev/null 2>&1; then sudo docker rm -f 'widgets'; fi"
    ));
    assert!(host.ran("sudo rm -rf '/opt/apps/widgets'"));
    assert!(host.ran(
        "sudo rm -f '/etc/nginx/sites-available/widgets' '/etc/nginx/sites-enabled/widgets'"
    ));
    assert!(host.ran("sudo nginx -t && sudo systemctl reload nginx"));
    assert!(!diagnostics.has_warnings());
}

#[tokio::test]
async fn nothing_deployed_still_succeeds_with_warnings() {
    let host = FakeHost::new();
    host.on("cd '/opt/apps/widgets'", [fail(1, "No such file or directory")]);
    let mut diagnostics = Diagnostics::default();

    flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap();

    // The missing release directory is the only thing worth reporting.
    assert_eq!(diagnostics.count(WarningKind::TeardownStep), 1);
    assert!(host.ran("systemctl reload nginx"));
}

#[tokio::test]
async fn compose_teardown_does_not_warn_about_a_missing_container() {
    let host = FakeHost::new();
    let mut diagnostics = Diagnostics::default();

    flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap();

    let removal = host
        .commands()
        .into_iter()
        .find(|c| c.contains("rm -f 'widgets'"))
        .unwrap();
    assert!(removal.starts_with("if sudo docker container inspect 'widgets'"));
    assert_eq!(diagnostics.count(WarningKind::TeardownStep), 0);
}

#[tokio::test]
async fn every_step_failing_never_aborts() {
    let host = FakeHost::new();
    host.on("", [fail(1, "boom")]);
    host.on("id -u", [ok("0")]);
    let mut diagnostics = Diagnostics::default();

    flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap();

    // compose detection failed too, so only the four non-compose steps ran
    assert_eq!(diagnostics.count(WarningKind::TeardownStep), 4);
    assert!(host.ran("docker rm -f 'widgets'"));
    assert!(host.ran("nginx -t"));
}

#[tokio::test]
async fn running_twice_is_harmless() {
    let host = FakeHost::new();
    let mut diagnostics = Diagnostics::default();

    flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap();
    flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap();

    assert_eq!(host.count("docker rm -f 'widgets'"), 2);
}

#[tokio::test]
async fn lost_connection_is_fatal() {
    let host = FakeHost::new();
    host.drop_connection_on("rm -rf");
    let mut diagnostics = Diagnostics::default();

    let err = flow::teardown_remote(&host, &request(), &mut diagnostics)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Remote(_)));
    assert!(!host.ran("nginx -t"));
}
