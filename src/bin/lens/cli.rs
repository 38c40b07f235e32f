use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use crate::output::OutputFormat;

/// Lens - image and text similarity search
#[derive(Parser)]
#[command(name = "lens", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long, env = "LENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Supabase project URL, used by the supabase blob store and postgrest metadata store.
    #[arg(long, env = "SUPABASE_URL", hide_env_values = true)]
    pub supabase_url: Option<String>,

    /// Supabase API key.
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Run one search and print the results.
    Search(SearchCommand),
    /// Load every mode and show its status.
    Inspect,
    /// Write an index and id map from a JSON file of vectors.
    BuildIndex(BuildIndexCommand),
}

#[derive(Parser)]
pub struct ServeCommand {
    /// Override the configured host.
    #[arg(long)]
    pub host: Option<String>,

    /// Override the configured port.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Parser)]
#[command(group(ArgGroup::new("query").required(true).args(["image", "text"])))]
pub struct SearchCommand {
    /// Query image file.
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Query text.
    #[arg(long)]
    pub text: Option<String>,

    /// Index mode. Defaults to `[search] default_mode`.
    #[arg(long)]
    pub mode: Option<String>,

    /// Minimum similarity score.
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<f32>,

    /// Maximum number of results.
    #[arg(long, allow_negative_numbers = true)]
    pub top_k: Option<i64>,
}

#[derive(Parser)]
pub struct BuildIndexCommand {
    /// JSON array of `{"id": ..., "vector": [...]}` records.
    #[arg(long)]
    pub vectors: PathBuf,

    /// Directory to write the artifacts into.
    #[arg(long)]
    pub output: PathBuf,

    /// Mode name used in the artifact file names.
    #[arg(long)]
    pub mode: String,
}
