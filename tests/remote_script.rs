// ABOUTME: Integration tests for remote step scripts against a scripted host.
// ABOUTME: Covers fallbacks, tolerated failures, fatal aborts, and transport errors.

mod support;

use gangway::remote::{RemoteScript, ScriptError, Step};
use support::{FakeHost, fail, ok};

#[tokio::test]
async fn steps_run_in_order() {
    let host = FakeHost::new();
    let script = RemoteScript::new("demo")
        .step(Step::fatal("first", "echo one"))
        .step(Step::fatal("second", "echo two"));

    let report = script.run(&host).await.unwrap();

    assert_eq!(host.commands(), ["echo one", "echo two"]);
    assert!(report.tolerated_failures().is_empty());
}

#[tokio::test]
async fn fatal_failure_stops_the_script() {
    let host = FakeHost::new();
    host.on("mkdir", [fail(1, "permission denied")]);
    let script = RemoteScript::new("demo")
        .step(Step::fatal("create", "mkdir /opt/apps"))
        .step(Step::fatal("never", "echo unreachable"));

    let err = script.run(&host).await.unwrap_err();

    match err {
        ScriptError::StepFailed {
            step,
            command,
            exit_code,
            output,
            ..
        } => {
            assert_eq!(step, "create");
            assert_eq!(command, "mkdir /opt/apps");
            assert_eq!(exit_code, 1);
            assert!(output.contains("permission denied"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!host.ran("unreachable"));
}

#[tokio::test]
async fn tolerated_failure_is_recorded_and_skipped() {
    let host = FakeHost::new();
    host.on("down", [fail(14, "no such project")]);
    let script = RemoteScript::new("demo")
        .step(Step::tolerated("stop", "compose down"))
        .step(Step::fatal("start", "compose up"));

    let report = script.run(&host).await.unwrap();

    assert_eq!(report.tolerated_failures(), ["stop"]);
    assert!(host.ran("compose up"));
}

#[tokio::test]
async fn fallback_runs_when_primary_fails() {
    let host = FakeHost::new();
    host.on("apt-get", [fail(127, "apt-get: not found")]);
    host.on("dnf", [ok("Complete!")]);
    let script = RemoteScript::new("demo")
        .step(Step::tolerated("install", "apt-get install -y nginx").or_else("dnf install -y nginx"));

    let report = script.run(&host).await.unwrap();

    assert!(report.tolerated_failures().is_empty());
    assert_eq!(report.output_of("install"), Some("Complete!"));
}

#[tokio::test]
async fn fallback_is_not_run_when_primary_succeeds() {
    let host = FakeHost::new();
    let script = RemoteScript::new("demo")
        .step(Step::fatal("install", "apt-get install -y nginx").or_else("dnf install -y nginx"));

    script.run(&host).await.unwrap();

    assert!(!host.ran("dnf"));
}

#[tokio::test]
async fn transport_error_aborts_even_tolerated_steps() {
    let host = FakeHost::new();
    host.drop_connection_on("systemctl");
    let script = RemoteScript::new("demo")
        .step(Step::tolerated("enable", "systemctl enable --now docker"))
        .step(Step::fatal("after", "echo after"));

    let err = script.run(&host).await.unwrap_err();

    assert!(matches!(err, ScriptError::Transport { ref step, .. } if step == "enable"));
    assert!(!host.ran("echo after"));
}
