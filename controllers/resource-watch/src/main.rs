//! Resource Watch Controller
//!
//! Keeps informers running for a configured set of resource kinds, resolved
//! by name through API discovery at startup.
//!
//! Informers that fail to start are retried on every status tick until they
//! sync; all informers are stopped on shutdown.

mod config;
mod controller;
mod error;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Resource Watch Controller");

    // Load configuration from environment variables
    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Resources: {}", config.resources.join(", "));
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Sync timeout: {:?}", config.sync_timeout);

    // Initialize and run controller
    let controller = Controller::new(&config).await?;
    controller.run().await?;

    Ok(())
}
