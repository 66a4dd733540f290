use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use terrain_graph::{ConfigLoader, Converter};

#[derive(Debug, Parser)]
#[command(author, version, about = "Convert elevation and landcover rasters into a cell-graph scenario")]
struct Cli {
    /// Path to the conversion YAML file
    #[arg(long, default_value = "configs/sample_conversion.yaml")]
    config: PathBuf,

    /// Override the sampling stride in pixels
    #[arg(long)]
    stride: Option<u32>,

    /// Override the scenario output path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Sample rows on the rayon pool
    #[arg(long)]
    parallel: bool,

    /// Skip the manifest sidecar
    #[arg(long)]
    no_manifest: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ConfigLoader::new(".");
    let mut config = loader
        .load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if let Some(stride) = cli.stride {
        config.stride = stride;
    }
    if let Some(output) = cli.output {
        config.output = output;
    }
    config.parallel |= cli.parallel;
    config.write_manifest &= !cli.no_manifest;
    config.validate().context("Invalid configuration after overrides")?;

    let converter = Converter::from_config(&config)?;
    let summary = converter
        .run(&config)
        .with_context(|| format!("Conversion '{}' failed", config.name))?;

    println!(
        "Scenario '{}' written to {} ({} cells, {} edges, {} samples skipped)",
        summary.name,
        summary.output.display(),
        summary.stats.cells,
        summary.stats.edges,
        summary.stats.skipped_samples
    );
    Ok(())
}
