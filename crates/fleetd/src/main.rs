//! fleetd — the fleet coordinator daemon.
//!
//! Assembles the coordinator core:
//! - Device state manager
//! - Task scheduler
//! - Orchestrator (against a simulated execution boundary)
//!
//! # Usage
//!
//! ```text
//! fleetd run --manifest fleet-manifest.toml --config fleet.toml
//! fleetd check-config --config fleet.toml
//! ```

mod manifest;
mod run;
mod simulator;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use fleet_core::{FleetConfig, LogFormat};

use crate::manifest::Manifest;
use crate::simulator::SimulatedExecutor;

#[derive(Parser)]
#[command(name = "fleetd", about = "Fleet coordinator daemon")]
struct Cli {
    /// Path to fleet.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log format.
    #[arg(long, global = true)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a manifest, execute every task, and print a JSON report.
    Run {
        /// Manifest listing devices, tasks, and simulation settings.
        #[arg(long)]
        manifest: PathBuf,
    },
    /// Parse and validate the configuration, then print it.
    CheckConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FleetConfig::from_file(path)?,
        None => FleetConfig::default(),
    };
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }

    init_tracing(&config);

    match cli.command {
        Command::Run { manifest } => run_fleet(manifest, config).await,
        Command::CheckConfig => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(config: &FleetConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_fleet(manifest_path: PathBuf, config: FleetConfig) -> anyhow::Result<()> {
    info!(manifest = ?manifest_path, "fleet coordinator starting");

    let manifest = Manifest::from_file(&manifest_path)?;
    let executor = Arc::new(SimulatedExecutor::new(&manifest.simulation));
    let report = run::run_manifest(manifest, &config, executor).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("fleet coordinator stopped");
    Ok(())
}
