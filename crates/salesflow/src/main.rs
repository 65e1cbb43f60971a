use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use salesflow_core::aggregator::DEFAULT_SHARDS;
use salesflow_core::config::ConfigLayer;
use salesflow_core::pipeline::{load_source, NoopObserver, StageObserver};
use salesflow_core::preview::PreviewObserver;
use salesflow_core::{PipelineConfig, PipelineError, PipelineSession};
use tokio::task;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Salesflow batch sales ETL", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean, classify and aggregate the source, then write both output datasets
    Run(RunArgs),
    /// Parse and clean the source without writing anything
    Validate(SourceArgs),
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// TOML file with pipeline settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Source CSV file (overrides SALESFLOW_SOURCE_PATH)
    #[arg(long)]
    source: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Destination of the region-partitioned transformed dataset
    #[arg(long)]
    transformed_output: Option<PathBuf>,
    /// Destination of the aggregated dataset
    #[arg(long)]
    aggregated_output: Option<PathBuf>,
    /// Number of hash partitions used while aggregating
    #[arg(long)]
    shuffle_partitions: Option<usize>,
    /// Concurrent aggregation shards; output is reproducible for a fixed value
    #[arg(long, default_value_t = default_shards())]
    shards: NonZeroUsize,
    /// Print the first N rows of each stage
    #[arg(long, default_value_t = 0)]
    show: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::Validate(args) => handle_validate(args).await,
    };

    if let Err(err) = &result {
        let stage = err
            .downcast_ref::<PipelineError>()
            .map(PipelineError::stage)
            .unwrap_or("startup");
        error!(stage, "pipeline failed: {err:#}");
    }
    result
}

fn default_shards() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_SHARDS).unwrap_or(NonZeroUsize::MIN)
}

fn init_tracing(format: LogFormat) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn handle_run(args: RunArgs) -> Result<()> {
    let cli_layer = ConfigLayer {
        source_path: args.source.source,
        transformed_path: args.transformed_output,
        aggregated_path: args.aggregated_output,
        shuffle_partitions: args.shuffle_partitions,
    };
    let layers = config_layers(args.source.config.as_deref(), cli_layer)?;
    let config = PipelineConfig::resolve(layers)?;

    let session = Arc::new(PipelineSession::open(config)?);
    let mut observer: Box<dyn StageObserver> = if args.show > 0 {
        Box::new(PreviewObserver::new(args.show, io::stdout()))
    } else {
        Box::new(NoopObserver)
    };

    let summary = session.run_concurrent(args.shards, observer.as_mut()).await?;
    info!(
        rows_written = summary.rows_written,
        groups_written = summary.groups_written,
        "ETL pipeline completed successfully"
    );

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn handle_validate(args: SourceArgs) -> Result<()> {
    let cli_layer = ConfigLayer {
        source_path: args.source,
        ..ConfigLayer::default()
    };
    let layers = config_layers(args.config.as_deref(), cli_layer)?;
    let source = ConfigLayer::merged(layers).require_source()?;

    let batch = task::spawn_blocking(move || load_source(&source, 0))
        .await
        .context("validation task panicked")??;
    info!(rows_read = batch.stats.rows_read, "source validated");

    println!("{}", serde_json::to_string_pretty(&batch.stats)?);
    Ok(())
}

/// Config file, then `.env`/environment, then command-line flags.
fn config_layers(config_file: Option<&Path>, cli: ConfigLayer) -> Result<Vec<ConfigLayer>> {
    dotenvy::dotenv().ok();

    let mut layers = Vec::with_capacity(3);
    if let Some(path) = config_file {
        layers.push(ConfigLayer::from_toml_file(path)?);
    }
    layers.push(ConfigLayer::from_env()?);
    layers.push(cli);
    Ok(layers)
}
