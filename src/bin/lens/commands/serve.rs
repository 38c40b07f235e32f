use anyhow::{Context, Result};
use lens::{LensConfig, SearchService};

use crate::cli::ServeCommand;

/// Load indexes and models, then serve HTTP until interrupted.
pub async fn run(cmd: ServeCommand, mut config: LensConfig) -> Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }

    let service = SearchService::from_config(&config)
        .await
        .context("Failed to initialize search service")?;
    lens::server::serve(service, &config)
        .await
        .context("Server terminated with an error")?;
    Ok(())
}
