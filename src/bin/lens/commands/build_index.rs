use anyhow::{Context, Result};
use lens::LensConfig;
use lens::index::builder::{IndexRecord, build_index, write_artifacts};

use crate::cli::BuildIndexCommand;
use crate::output::{self, OutputFormat};

/// Write a flat inner-product index and id map for one mode.
pub fn run(cmd: BuildIndexCommand, config: &LensConfig, format: OutputFormat) -> Result<()> {
    let content = std::fs::read(&cmd.vectors)
        .with_context(|| format!("Failed to read {}", cmd.vectors.display()))?;
    let records: Vec<IndexRecord> =
        serde_json::from_slice(&content).context("Failed to parse vectors JSON")?;

    let (index, id_map) = build_index(records)?;
    let (index_path, id_map_path) =
        write_artifacts(&cmd.output, &cmd.mode, &config.index_keys, &index, &id_map)
            .context("Failed to write index artifacts")?;

    output::print_build_summary(
        &cmd.mode,
        index.len(),
        index.dimension(),
        &[index_path.as_path(), id_map_path.as_path()],
        format,
    )
}
