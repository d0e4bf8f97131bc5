mod bot;
mod config;
mod extractor;
mod links;
#[cfg(test)]
mod testing;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::{BotMode, Config};
use crate::extractor::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so RUST_LOG from it applies to the subscriber
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,linkgrab=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    // Load configuration; an explicitly named file must exist
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);
    let required = explicit_path.is_some();
    let config_path = explicit_path.unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path, required)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Mode: {}", config.telegram.mode);
    info!("  Listen: {}", config.listen_addr());
    info!("  Extractor: {}", config.extractor.binary);
    info!(
        "  Certificate checks: {}",
        if config.extractor.check_certificates { "on" } else { "off" }
    );

    let bot = Bot::new(&config.telegram.bot_token);
    let resolver = Arc::new(YtDlpResolver::new(config.extractor.clone()));
    let mode = config.telegram.mode;
    let webhook_url = config.webhook_url();

    let state = Arc::new(AppState::new(config, Arc::new(bot.clone()), resolver));

    info!("Bot is starting...");
    match mode {
        BotMode::Webhook => {
            if let Some(url) = webhook_url {
                webhook::register(&bot, &url).await?;
            }
            webhook::serve(state).await?;
        }
        BotMode::Polling => bot::run_polling(bot, state).await?,
    }

    Ok(())
}
