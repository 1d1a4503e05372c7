mod config;
mod identity;
mod links;
mod platform;
mod relay;
mod resolver;
mod transfer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::relay::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tiktok_relay=debug".into()),
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
    info!("  Resolver: {}", config.resolver.base_url);
    info!(
        "  Timeouts: resolve {}s, transfer {}s",
        config.resolver.timeout_secs, config.transfer.timeout_secs
    );
    match &config.transfer.temp_dir {
        Some(dir) => info!("  Temp dir: {}", dir.display()),
        None => info!("  Temp dir: {}", std::env::temp_dir().display()),
    }

    let bot = Bot::new(&config.telegram.bot_token);
    let relay = Arc::new(Relay::new(&config));

    info!("Bot is running...");
    platform::telegram::run(relay, bot).await?;

    Ok(())
}
