mod config;
mod counter;
mod dispatch;
mod platform;
mod resolver;
mod server;
mod service;
mod token;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::counter::FileCounterStore;
use crate::dispatch::Dispatcher;
use crate::platform::telegram::TelegramApi;
use crate::server::AppState;
use crate::service::RelayService;
use crate::token::TokenCipher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pingrelay=debug".into()),
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

    // Secrets are loaded before anything binds; there is no fallback key
    // and no fallback credential.
    let key = config.crypto.load_key()?;
    let bot_token = config.telegram.load_bot_token()?;

    info!("Configuration loaded successfully");
    info!("  Bind address: {}", config.server.bind_addr);
    info!("  Telegram API: {}", config.telegram.api_base);
    info!("  Counter file: {}", config.counter.path.display());
    info!("  Deterministic IV: {}", config.crypto.deterministic_iv);

    let cipher = TokenCipher::new(key, config.crypto.deterministic_iv);
    let store = Arc::new(FileCounterStore::create(&config.counter.path).with_context(|| {
        format!(
            "Failed to open counter file: {}",
            config.counter.path.display()
        )
    })?);
    let platform = Arc::new(TelegramApi::new(config.telegram.api_base.clone(), bot_token));
    let dispatcher = Dispatcher::new(
        platform.clone(),
        cipher.clone(),
        config.dispatch.message.clone(),
        Duration::from_millis(config.dispatch.retry_delay_ms),
        config.dispatch.max_retries,
    );
    let service = Arc::new(RelayService::new(platform, store, cipher, dispatcher));

    let app = server::router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind_addr))?;

    info!("Relay listening on {}", config.server.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
