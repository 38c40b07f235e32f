use anyhow::{Context, Result};
use lens::LensConfig;

use crate::cli::Cli;

/// Load the configuration file (or defaults) and apply Supabase overrides.
pub fn load_config(cli: &Cli) -> Result<LensConfig> {
    let mut config = match &cli.config {
        Some(path) => LensConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LensConfig::default(),
    };
    config.apply_supabase_credentials(cli.supabase_url.as_deref(), cli.supabase_key.as_deref());
    Ok(config)
}
