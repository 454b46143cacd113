// ABOUTME: Entry point for the gangway CLI application.
// ABOUTME: Collects parameters, sets up the run log, and races the flow against Ctrl-C.

mod cli;

use clap::Parser;
use cli::Cli;
use gangway::config::{self, DeployFile, TerminalPrompter};
use gangway::diagnostics::Diagnostics;
use gangway::error::{Error, Result};
use gangway::flow;
use gangway::logging::RunLog;
use std::env;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let run_id = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();

    let log = match RunLog::init(&cli.log_dir, &run_id, cli.verbose) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Logging to {}", log.path().display());

    let mut diagnostics = Diagnostics::default();
    let result = tokio::select! {
        result = run(&cli, &run_id, &mut diagnostics) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted),
    };

    flow::summarize(&diagnostics);

    if let Err(e) = result {
        tracing::error!("{e}");
        if e.is_precondition() {
            tracing::info!("Nothing was changed on the remote host");
        }
        tracing::error!("See {} for the full log", log.path().display());
        drop(log);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, run_id: &str, diagnostics: &mut Diagnostics) -> Result<()> {
    let cwd = env::current_dir()?;
    if cli.config.is_none() && cwd.join(config::CONFIG_FILENAME).is_file() {
        tracing::info!(
            "Found {0}; pass --config {0} to skip the prompts",
            config::CONFIG_FILENAME
        );
    }

    if cli.teardown {
        let request = match &cli.config {
            Some(path) => DeployFile::load(path)?.into_teardown()?,
            None => config::collect_teardown(&mut TerminalPrompter)?,
        };
        return flow::teardown(&request, diagnostics).await;
    }

    let request = match &cli.config {
        Some(path) => DeployFile::load(path)?.into_deployment(run_id, &cwd, diagnostics)?,
        None => config::collect_deployment(&mut TerminalPrompter, run_id, &cwd, diagnostics)?,
    };
    flow::deploy(&request, diagnostics).await
}
