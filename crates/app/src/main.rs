//! Herald - due-item notification dispatcher
//!
//! Main entry point: loads configuration, starts the workers and runs until
//! Ctrl-C.

use anyhow::Context;
use herald_app::{logging, AppContext};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before config so its variables are visible to the loader
    let dotenv = dotenvy::dotenv();

    let config = herald_infra::config::load().context("failed to load configuration")?;
    logging::init(&config.logging).context("failed to initialise logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => debug!(error = %e, "No .env file loaded"),
    }

    let mut ctx = AppContext::new(config).context("failed to build application context")?;
    ctx.start().await.context("failed to start workers")?;
    info!("Herald running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    ctx.shutdown().await.context("shutdown did not complete cleanly")?;
    Ok(())
}
