use std::sync::Arc;

use anyhow::Context;
use roomrelay::{
    config::Config,
    db::{self, DEFAULT_ROOMS},
    rooms::RoomDirectory,
    transport::{BotApi, Fallback, Transport, WsHub},
    AppState,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,roomrelay=debug,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("failed to open {}", config.database_url))?;
    db::init_schema(&db_pool).await.context("failed to create schema")?;
    RoomDirectory::new(db_pool.clone()).seed(&DEFAULT_ROOMS).await?;

    let hub = WsHub::new();
    let transport: Arc<dyn Transport> = match &config.bot_token {
        Some(token) => {
            info!("bot api delivery enabled");
            Arc::new(Fallback::new(vec![
                Arc::new(hub.clone()),
                Arc::new(BotApi::new(&config.bot_api_url, token)),
            ]))
        }
        None => Arc::new(hub.clone()),
    };

    let app_state = AppState::new(db_pool, &config, hub, transport);
    let app = roomrelay::app(app_state, &config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
