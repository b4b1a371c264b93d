//! session-vault - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the vault API.

use session_vault::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_vault=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: store={:?} data_dir={}",
        config.store_backend,
        config.data_dir.display()
    );

    api::serve(config).await?;

    Ok(())
}
