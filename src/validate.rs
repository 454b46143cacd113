// ABOUTME: Post-deployment validation: container health on the host, proxy check, external probe.
// ABOUTME: Remote checks are fatal; the probe from this machine only produces a warning.

use crate::config::Timings;
use crate::container;
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::provision::HostProfile;
use crate::remote::{RemoteExecutor, quote};
use crate::types::{AppName, ContainerPort};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

/// Log lines attached when the application never becomes healthy.
pub const FAILURE_LOG_LINES: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(
        "{url} did not answer with 200, 301 or 302 after {attempts} attempts (last status {last_status})\nlast container log lines:\n{logs}"
    )]
    Unhealthy {
        url: String,
        attempts: u32,
        last_status: u16,
        logs: String,
    },

    #[error("proxy check of {url} returned status {status}")]
    Proxy { url: String, status: u16 },
}

pub fn is_success(status: u16) -> bool {
    matches!(status, 200 | 301 | 302)
}

/// Remote curl that always exits 0 and prints only the status code.
///
/// curl prints `000` when it cannot connect at all.
pub fn status_command(url: &str) -> String {
    format!(
        "curl -s -o /dev/null -w '%{{http_code}}' --max-time 5 {} || true",
        quote(url)
    )
}

fn parse_status(stdout: &str) -> u16 {
    stdout.trim().parse().unwrap_or(0)
}

/// HTTP status `url` returns when fetched on the remote host.
pub async fn remote_status<E>(executor: &E, url: &str) -> Result<u16>
where
    E: RemoteExecutor + ?Sized,
{
    let output = executor.exec(&status_command(url)).await?;
    Ok(parse_status(&output.stdout))
}

/// Wait for the app to answer on its port, then check the proxy in front of it.
pub async fn validate_remote<E>(
    executor: &E,
    profile: &HostProfile,
    app: &AppName,
    port: ContainerPort,
    timings: &Timings,
) -> Result<()>
where
    E: RemoteExecutor + ?Sized,
{
    let container = container::require_running(executor, profile, app).await?;

    if !timings.warmup.is_zero() {
        tracing::info!("Giving the application {:?} to warm up", timings.warmup);
        tokio::time::sleep(timings.warmup).await;
    }

    let url = format!("http://localhost:{}", port);
    let attempts = timings.poll_attempts.max(1);
    let mut last_status = 0;
    let mut healthy = false;

    for attempt in 1..=attempts {
        last_status = remote_status(executor, &url).await?;
        tracing::info!(
            "{} answered {} (attempt {}/{})",
            url,
            last_status,
            attempt,
            attempts
        );
        if is_success(last_status) {
            healthy = true;
            break;
        }
        if attempt < attempts {
            tokio::time::sleep(timings.poll_interval).await;
        }
    }

    if !healthy {
        let logs = container::log_tail(executor, profile, &container, FAILURE_LOG_LINES).await?;
        tracing::error!("Last {} log lines of {}:\n{}", FAILURE_LOG_LINES, container.names, logs);
        return Err(ValidationError::Unhealthy {
            url,
            attempts,
            last_status,
            logs,
        }
        .into());
    }

    let proxy_url = "http://localhost:80";
    let status = remote_status(executor, proxy_url).await?;
    if !is_success(status) {
        return Err(ValidationError::Proxy {
            url: proxy_url.to_string(),
            status,
        }
        .into());
    }
    tracing::info!("nginx on the host answered {}", status);
    Ok(())
}

/// GET `http://<host>:80/` from this machine.
pub async fn probe_external(host: &str, timeout: Duration) -> std::result::Result<u16, String> {
    match tokio::time::timeout(timeout, fetch_status(host, 80)).await {
        Ok(result) => result,
        Err(_) => Err(format!("no answer within {:?}", timeout)),
    }
}

async fn fetch_status(host: &str, port: u16) -> std::result::Result<u16, String> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| format!("connect failed: {}", e))?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| format!("HTTP handshake failed: {}", e))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("external probe connection error: {}", e);
        }
    });

    let req = hyper::Request::builder()
        .method("GET")
        .uri("/")
        .header("Host", host)
        .header("User-Agent", concat!("gangway/", env!("CARGO_PKG_VERSION")))
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| format!("failed to build request: {}", e))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| format!("request failed: {}", e))?;
    Ok(resp.status().as_u16())
}

/// Check reachability from this machine. Never fails the run.
pub async fn check_external(host: &str, timeout: Duration, diagnostics: &mut Diagnostics) {
    match probe_external(host, timeout).await {
        Ok(status) if is_success(status) => {
            tracing::info!("http://{}/ answered {} from this machine", host, status)
        }
        Ok(status) => diagnostics.warn(Warning::external_unreachable(format!(
            "http://{}/ answered {} from this machine; check firewall and DNS",
            host, status
        ))),
        Err(reason) => diagnostics.warn(Warning::external_unreachable(format!(
            "http://{}/ is not reachable from this machine ({}); check firewall and DNS",
            host, reason
        ))),
    }
}
