mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::{build_index, inspect, search, serve};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON output on stdout stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;
    let config = context::load_config(&cli)?;

    match cli.command {
        Command::Serve(cmd) => serve::run(cmd, config).await,
        Command::Search(cmd) => search::run(cmd, config, format).await,
        Command::Inspect => inspect::run(config, format).await,
        Command::BuildIndex(cmd) => build_index::run(cmd, &config, format),
    }
}
