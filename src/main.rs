//! # Chat Hub
//!
//! Application entry point. Initializes logging, loads configuration and
//! serves HTTP and WebSocket traffic until a shutdown signal.

use anyhow::Result;
use tracing::info;

use chat_hub::config::Settings;
use chat_hub::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before the log filter is read
    dotenvy::dotenv().ok();

    chat_hub::telemetry::init_tracing();

    info!("Starting Chat Hub...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        overflow_policy = ?settings.hub.overflow_policy,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
