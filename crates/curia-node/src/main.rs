use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use curia_node::logging::init_logging;
use curia_node::{Metrics, NodeConfig, Scenario};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "curia")]
#[command(about = "Curia - content curation and paid-task protocol engine", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Output file
        #[arg(short, long, default_value = "curia.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Replay a JSON scenario against an in-memory engine and print every step outcome
    Replay {
        /// Scenario file
        scenario: PathBuf,

        /// Print compact single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Replay a scenario and print the resulting Prometheus metrics
    Metrics {
        /// Scenario file
        scenario: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;

    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Init { output, force } => init(&config, &output, force),
        Commands::Replay { scenario, compact } => replay(&config, &scenario, compact).await,
        Commands::Metrics { scenario } => metrics(&config, &scenario).await,
    }
}

fn init(config: &NodeConfig, output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    config.save_to_file(output)?;
    info!(path = %output.display(), "⚙️ Configuration written");
    Ok(())
}

async fn replay(config: &NodeConfig, path: &Path, compact: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let metrics = build_metrics(config)?;
    let report = scenario.run(config.engine_config(), metrics).await?;

    let rendered = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{}", rendered);

    if report.failed_steps > 0 {
        info!(failed = report.failed_steps, "Some steps were refused");
    }
    Ok(())
}

async fn metrics(config: &NodeConfig, path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let metrics = Metrics::new().context("registering metrics")?;
    scenario
        .run(config.engine_config(), Some(metrics.clone()))
        .await?;
    print!("{}", metrics.gather());
    Ok(())
}

fn build_metrics(config: &NodeConfig) -> Result<Option<Metrics>> {
    if !config.metrics.enabled {
        return Ok(None);
    }
    Ok(Some(Metrics::new().context("registering metrics")?))
}
