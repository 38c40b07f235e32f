use std::path::Path;

use clap::ValueEnum;
use lens::{IndexRegistry, ModeState, SearchHit};
use serde_json::json;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table.
    Table,
    /// JSON output.
    Json,
}

#[derive(Tabled)]
struct SearchHitRow {
    #[tabled(rename = "Image")]
    image_id: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Brand")]
    brand: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Model")]
    model_number: String,
}

#[derive(Tabled)]
struct ModeRow {
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Vectors")]
    vectors: String,
    #[tabled(rename = "Dimension")]
    dimension: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

/// Print search results.
pub fn print_search_results(hits: &[SearchHit], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "results": hits }))?
            );
        }
        OutputFormat::Table => {
            if hits.is_empty() {
                println!("No results found.");
                return Ok(());
            }

            let rows: Vec<SearchHitRow> = hits
                .iter()
                .map(|hit| SearchHitRow {
                    image_id: hit.image_id.clone(),
                    score: format!("{:.4}", hit.score),
                    brand: text(&hit.brand_name),
                    product: text(&hit.product_name),
                    variant: text(&hit.variant_name),
                    model_number: text(&hit.model_number),
                })
                .collect();

            let table = Table::new(&rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
    }
    Ok(())
}

/// Print per-mode load status.
pub fn print_modes(registry: &IndexRegistry, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let modes: serde_json::Map<String, serde_json::Value> = registry
                .modes()
                .map(|(name, state)| {
                    let value = match state {
                        ModeState::Loaded(index) => json!({
                            "loaded": true,
                            "vectors": index.index().len(),
                            "dimension": index.index().dimension(),
                        }),
                        ModeState::Absent { reason } => json!({
                            "loaded": false,
                            "reason": reason,
                        }),
                    };
                    (name.to_string(), value)
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&modes)?);
        }
        OutputFormat::Table => {
            let rows: Vec<ModeRow> = registry
                .modes()
                .map(|(name, state)| match state {
                    ModeState::Loaded(index) => ModeRow {
                        mode: name.to_string(),
                        status: "loaded".to_string(),
                        vectors: index.index().len().to_string(),
                        dimension: index.index().dimension().to_string(),
                    },
                    ModeState::Absent { reason } => ModeRow {
                        mode: name.to_string(),
                        status: format!("absent: {reason}"),
                        vectors: "-".to_string(),
                        dimension: "-".to_string(),
                    },
                })
                .collect();

            let table = Table::new(&rows).with(Style::rounded()).to_string();
            println!("{table}");
        }
    }
    Ok(())
}

/// Print the files written by `build-index`.
pub fn print_build_summary(
    mode: &str,
    vectors: usize,
    dimension: usize,
    files: &[&Path],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "mode": mode,
                    "vectors": vectors,
                    "dimension": dimension,
                    "files": files,
                }))?
            );
        }
        OutputFormat::Table => {
            println!("Indexed {vectors} vectors of dimension {dimension} for mode '{mode}'.");
            for file in files {
                println!("  {}", file.display());
            }
        }
    }
    Ok(())
}
