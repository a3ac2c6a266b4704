use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_pipeline::pipeline::plan::EnrichmentFlags;
use photo_pipeline::{Pipeline, PipelineConfig};

/// Command-line arguments; anything given here overrides the config file
#[derive(Parser, Debug)]
#[command(name = "photo-pipeline")]
#[command(about = "Optimize a photo folder and keep its manifest enriched")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "PHOTO_PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the original photos
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory for optimized copies
    #[arg(long)]
    optimized: Option<PathBuf>,

    /// Manifest file to update
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Size budget per optimized image, in KB
    #[arg(long)]
    max_size_kb: Option<u64>,

    /// Longest side of a resized image, in pixels
    #[arg(long)]
    max_dimension: Option<u32>,

    /// Photos processed concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Process one photo at a time, rewriting the manifest after each
    #[arg(long)]
    serial: bool,

    /// Records per manifest rewrite in parallel mode
    #[arg(long)]
    batch_size: Option<usize>,

    /// Only look at the top level of the source directory
    #[arg(long)]
    no_recursive: bool,

    /// Run sentiment analysis
    #[arg(long)]
    sentiment: bool,

    /// Run colour analysis
    #[arg(long)]
    color: bool,

    /// Run object detection
    #[arg(long)]
    objects: bool,

    /// Extract capture timestamps
    #[arg(long)]
    timestamp: bool,

    /// Run every enrichment
    #[arg(long)]
    all: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(source) = &self.source {
            config.source_dir = source.clone();
        }
        if let Some(optimized) = &self.optimized {
            config.optimized_dir = optimized.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.manifest = manifest.clone();
        }
        if let Some(max_size_kb) = self.max_size_kb {
            config.max_size_kb = max_size_kb;
        }
        if let Some(max_dimension) = self.max_dimension {
            config.max_dimension = max_dimension;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        config.serial |= self.serial;
        if self.no_recursive {
            config.recursive = false;
        }

        // Flags only switch dimensions on; the file may already enable others
        if self.all {
            config.enrich.flags = EnrichmentFlags::all();
        }
        let flags = &mut config.enrich.flags;
        flags.sentiment |= self.sentiment;
        flags.color |= self.color;
        flags.objects |= self.objects;
        flags.timestamp |= self.timestamp;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "photo_pipeline=debug"
    } else {
        "photo_pipeline=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = PipelineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    info!("Source: {}", config.source_dir.display());
    info!("Optimized: {}", config.optimized_dir.display());
    info!("Manifest: {}", config.manifest.display());

    let enrichers = config.enrich.build_enrichers();
    let pipeline = Pipeline::new(&config, enrichers).context("Invalid pipeline settings")?;

    let summary = pipeline.run().await.context("Photo pipeline failed")?;
    info!(
        "Done: {} of {} photos recorded in {}",
        summary.recorded,
        summary.discovered,
        config.manifest.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "photo-pipeline",
            "--source",
            "pics",
            "--max-size-kb",
            "250",
            "--serial",
            "--no-recursive",
            "--color",
        ]);
        let mut config = PipelineConfig {
            workers: 2,
            ..Default::default()
        };
        config.enrich.flags.timestamp = true;

        args.apply(&mut config);

        assert_eq!(config.source_dir, PathBuf::from("pics"));
        assert_eq!(config.max_size_kb, 250);
        assert_eq!(config.workers, 2);
        assert!(config.serial);
        assert!(!config.recursive);
        assert!(config.enrich.flags.color);
        assert!(config.enrich.flags.timestamp);
        assert!(!config.enrich.flags.objects);
    }

    #[test]
    fn test_all_enables_every_dimension() {
        let args = Args::parse_from(["photo-pipeline", "--all"]);
        let mut config = PipelineConfig::default();
        args.apply(&mut config);
        assert_eq!(config.enrich.flags, EnrichmentFlags::all());
    }
}
