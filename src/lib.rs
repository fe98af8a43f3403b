pub mod config;
pub mod document_store;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod observability;
pub mod producer;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod telemetry;

use clap::Parser;

/// Run the bootstrap sequence with flags and environment of this process
pub async fn run_service() -> anyhow::Result<()> {
    let cli = config::Cli::parse();
    service::run_with_config(cli).await
}
