//! Evently API Server

use anyhow::Context;
use evently_api::auth::{PasswordConfig, PasswordHasher};
use evently_api::logging::init_logging;
use evently_api::shutdown::{listen_for_shutdown_signals, serve_with_shutdown, ShutdownSignal};
use evently_api::{create_router, state::AppState};
use evently_core::{AppConfig, PgStore, Repositories};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets are checked here; a bad configuration never reaches the listener
    let config = AppConfig::load().context("invalid configuration")?;
    init_logging(&config.logging, &config.environment)?;

    for key in config.weak_secrets() {
        tracing::warn!(
            key,
            min_len = evently_core::config::MIN_RECOMMENDED_SECRET_LEN,
            "Signing secret is shorter than recommended"
        );
    }

    tracing::info!(
        environment = %config.environment,
        database = ?config.database,
        "Configuration loaded"
    );

    let store = Arc::new(
        PgStore::connect(&config.database)
            .await
            .context("failed to connect to PostgreSQL")?,
    );
    store.migrate().await.context("failed to run migrations")?;

    let hasher = PasswordHasher::new(PasswordConfig::default())?;
    let addr = config.server.bind_addr();
    let grace = config.server.shutdown_grace();
    let state = Arc::new(AppState::new(
        config,
        Repositories::from_store(store.clone()),
        hasher,
    )?);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Evently API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));

    let served = serve_with_shutdown(listener, app, shutdown, grace).await;

    store.close().await;
    tracing::info!("Database pool closed");

    served
}
