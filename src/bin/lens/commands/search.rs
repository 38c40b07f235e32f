use anyhow::{Context, Result};
use lens::{LensConfig, QueryInput, SearchRequestBuilder, SearchService};

use crate::cli::SearchCommand;
use crate::output::{self, OutputFormat};

/// Execute a single search through the full pipeline.
pub async fn run(cmd: SearchCommand, config: LensConfig, format: OutputFormat) -> Result<()> {
    let file = match &cmd.image {
        Some(path) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?,
        ),
        None => None,
    };
    let query = QueryInput::from_parts(file, cmd.text)?;

    let request = SearchRequestBuilder::new(query)
        .mode(cmd.mode.unwrap_or_else(|| config.search.default_mode.clone()))
        .threshold(cmd.threshold.unwrap_or(config.search.default_threshold))
        .top_k(cmd.top_k.unwrap_or(config.search.default_top_k))
        .build();

    let service = SearchService::from_config(&config)
        .await
        .context("Failed to initialize search service")?;
    let outcome = service.search(request).await?;

    for failure in &outcome.failed_chunks {
        eprintln!(
            "warning: metadata lookup failed for {} ids: {}",
            failure.ids.len(),
            failure.cause
        );
    }
    output::print_search_results(&outcome.hits, format)
}
