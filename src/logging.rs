// ABOUTME: Run logging: console output plus a timestamped log file per invocation.
// ABOUTME: Remote command output reaches both; the file also keeps gangway's debug detail.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Other crates only contribute their info lines to the file.
const FILE_DIRECTIVES: &str = "info,gangway=debug";

/// Keeps the file writer flushing until dropped. Hold it until the process exits.
pub struct RunLog {
    path: PathBuf,
    _guard: WorkerGuard,
}

impl RunLog {
    /// Install the global subscriber and create `gangway-<run_id>.log` in `dir`.
    pub fn init(dir: &Path, run_id: &str, verbose: bool) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let prefix = log_file_prefix(run_id);
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(&prefix)
            .filename_suffix("log")
            .build(dir)
            .map_err(|e| Error::Logging(e.to_string()))?;
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let console_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(console_directives(verbose)));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(console_filter),
            )
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(EnvFilter::new(FILE_DIRECTIVES)),
            )
            .try_init()
            .map_err(|e| Error::Logging(e.to_string()))?;

        Ok(Self {
            path: dir.join(format!("{}.log", prefix)),
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn log_file_prefix(run_id: &str) -> String {
    format!("gangway-{}", run_id)
}

fn console_directives(verbose: bool) -> &'static str {
    if verbose {
        "info,gangway=debug"
    } else {
        "warn,gangway=info"
    }
}
