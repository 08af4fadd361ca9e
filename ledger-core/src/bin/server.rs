//! Ledger server binary
//!
//! Opens the ledger and keeps it running until interrupted. Transports
//! (gRPC, message queue) are expected to be mounted in front of the
//! `Ledger` handle by the service layer.

use ledger_core::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Clearline Ledger Server");

    // Load configuration
    let config = Config::from_env()?;

    // Open ledger
    let ledger = Ledger::open(config).await?;
    tracing::info!("Ledger opened successfully");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    ledger.shutdown().await?;
    Ok(())
}
