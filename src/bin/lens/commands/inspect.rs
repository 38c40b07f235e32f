use anyhow::{Context, Result};
use lens::{BlobStoreFactory, IndexRegistry, LensConfig};

use crate::output::{self, OutputFormat};

/// Load every configured mode and report whether it is usable.
pub async fn run(config: LensConfig, format: OutputFormat) -> Result<()> {
    let store = BlobStoreFactory::create(config.blob_store.clone())
        .context("Failed to create blob store")?;
    let registry = IndexRegistry::load(store.as_ref(), &config.modes, &config.index_keys).await;
    output::print_modes(&registry, format)
}
