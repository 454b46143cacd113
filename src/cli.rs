// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Deploy is the default; --teardown removes a deployment instead.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gangway")]
#[command(about = "Deploy a git repository to a remote host with Docker Compose and nginx")]
#[command(version)]
pub struct Cli {
    /// Remove a deployed application instead of deploying
    #[arg(long)]
    pub teardown: bool,

    /// Read parameters from a YAML file instead of prompting
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the per-run log file
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Show debug output, including remote command output, on the console
    #[arg(short, long)]
    pub verbose: bool,
}
