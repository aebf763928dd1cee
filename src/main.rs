mod bot;
mod config;
mod lookup;
mod platform;
mod query;
mod reply;
#[cfg(test)]
mod testing;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::QueryBot;
use crate::config::Config;
use crate::webhook::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,simbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let overrides = config.apply_overrides(|key| std::env::var(key).ok());

    // A bad configuration does not stop the server: updates get a 500 until it is fixed.
    let bot = overrides.and_then(|()| config.validate()).and_then(|settings| {
        info!("Configuration loaded successfully");
        info!("  Lookup: {}", settings.lookup.describe());
        info!("  Reply style: {:?}", settings.reply_style);
        QueryBot::from_settings(&settings)
    });
    if let Err(e) = &bot {
        error!("Configuration incomplete, webhook will answer 500: {}", e);
    }

    let app = webhook::router(Arc::new(AppState::new(bot)));

    let addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Webhook listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Webhook stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
