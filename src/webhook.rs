//! HTTP side of the bot: Telegram pushes updates to `POST /<bot token>`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use crate::bot::AppState;

pub const ALIVE_TEXT: &str = "✅ Bot is alive!";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/{token}", post(receive_update))
        .with_state(state)
}

async fn alive() -> &'static str {
    ALIVE_TEXT
}

async fn receive_update(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    body: Bytes,
) -> Result<&'static str, StatusCode> {
    if token != state.bot_token() {
        return Err(StatusCode::NOT_FOUND);
    }

    let update: Update = serde_json::from_slice(&body).map_err(|e| {
        warn!("Rejected malformed update payload: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    debug!("Received update {:?}", update.id);

    // Telegram redelivers on non-2xx, so failures past this point are only logged.
    if let Err(e) = state.handle_update(&update).await {
        error!("Error handling update {:?}: {:#}", update.id, e);
    }

    Ok("ok")
}

/// Point Telegram at `<public_url>/<token>`.
pub async fn register(bot: &Bot, webhook_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(webhook_url).context("Invalid telegram.public_url")?;
    bot.set_webhook(url)
        .await
        .context("Failed to register webhook with Telegram")?;
    info!("Webhook registered at <public_url>/<token>");
    Ok(())
}

pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = state.config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening on {} (webhook path /<token>)", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
