//! CLI entry point for the Eiger parameter mirror.
//!
//! # Usage
//!
//! Print the discovered attribute table:
//! ```bash
//! eiger-daq --config eiger.toml discover
//! ```
//!
//! Mirror the detector until Ctrl+C, logging every value change:
//! ```bash
//! RUST_LOG=info eiger-daq run
//! ```
//!
//! Set `connection.mock = true` (or `EIGER_CONNECTION__MOCK=true`) to run
//! against the built-in simulated detector.

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Settings;
use eiger_controller::{EigerController, ScanRunner};
use eiger_core::Connector;
use eiger_driver_mock::MockDetector;
use eiger_http::HttpConnector;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eiger-daq", version)]
#[command(about = "Discover and mirror an Eiger detector's parameters", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover the detector, print the attribute table as JSON and exit
    Discover,

    /// Discover, then poll every attribute until Ctrl+C
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let connector: Arc<dyn Connector> = if settings.connection.mock {
        info!("Using simulated detector");
        Arc::new(MockDetector::simulated())
    } else {
        Arc::new(HttpConnector::new(settings.http()))
    };

    let mut controller = EigerController::new(settings.controller_options());
    controller
        .initialise(connector.as_ref())
        .await
        .with_context(|| format!("Failed to initialise controller for {}", connector.endpoint()))?;

    let outcome = match cli.command {
        Commands::Discover => print_discovery(&controller),
        Commands::Run => run(&controller).await,
    };

    controller
        .close()
        .await
        .context("Failed to close controller")?;
    outcome
}

fn print_discovery(controller: &EigerController) -> Result<()> {
    let attributes: Vec<_> = controller.attributes().map(|a| a.descriptor()).collect();
    let decisions = controller
        .discovery()
        .map(|discovery| discovery.decisions.as_slice())
        .unwrap_or_default();

    let table = json!({
        "attributes": attributes,
        "decisions": decisions,
        "sent_initialize": controller.sent_initialize(),
    });
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

async fn run(controller: &EigerController) -> Result<()> {
    let scans = ScanRunner::start(controller.attributes());

    let loggers: Vec<_> = controller
        .attributes()
        .map(|attribute| {
            let name = attribute.name().to_string();
            let mut changes = attribute.subscribe();
            tokio::spawn(async move {
                while let Some(value) = changes.changed().await {
                    info!(%name, %value, "Value changed");
                }
            })
        })
        .collect();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutdown signal received, stopping scans");

    scans.stop().await;
    for logger in loggers {
        logger.abort();
    }
    Ok(())
}
