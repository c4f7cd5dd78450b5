mod access;
mod bot;
mod config;
mod platform;
mod server;
mod storage;
#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::platform::telegram::TelegramGateway;
use crate::storage::S3Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bucket: {}", config.storage.bucket);
    info!("  Required channel: {}", config.telegram.required_channel_id);
    info!("  Error chat: {}", config.telegram.error_chat_id);
    info!("  Presign expiry: {}s", config.storage.presign_expiry_secs);

    let gateway = TelegramGateway::new(&config.telegram)?;
    let store = S3Store::from_config(&config.storage).await;

    let state = Arc::new(AppState::new(config, Arc::new(gateway), Arc::new(store)));

    info!("Bot is starting...");
    server::serve(state).await?;

    Ok(())
}
