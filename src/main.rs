//! eventline - event registration bot for the LINE messaging platform
//!
//! Hosts register events through a guided chat conversation. The server
//! receives platform webhooks, drives one registration session per user and
//! exposes the stored users, events and participants over HTTP.

mod api;
mod config;
mod db;
mod dispatch;
mod gateway;
mod platform;
mod prompt;
mod render;
mod runtime;
mod session;
mod state_machine;

use api::{create_router, AppState};
use config::{AppConfig, SessionBackend};
use db::Database;
use dispatch::Dispatcher;
use gateway::{DatabaseGateway, Gateway, HttpGateway};
use platform::{LinePlatformClient, LoggingPlatformClient, PlatformClient};
use render::FlexTicketRenderer;
use runtime::{spawn_session_sweeper, RuntimeManager};
use session::{DatabaseSessionStore, InMemorySessionStore, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventline=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let store: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Memory => Arc::new(InMemorySessionStore::new(config.session_ttl)),
        SessionBackend::Database => {
            Arc::new(DatabaseSessionStore::new(db.clone(), config.session_ttl))
        }
    };
    tracing::info!(
        backend = ?config.session_backend,
        ttl_secs = config.session_ttl.as_secs(),
        "Session store ready"
    );

    let gateway: Arc<dyn Gateway> = match &config.gateway_url {
        Some(url) => {
            tracing::info!(url = %url, "Using remote gateway");
            Arc::new(HttpGateway::new(url)?)
        }
        None => Arc::new(DatabaseGateway::new(db.clone())),
    };

    let platform: Arc<dyn PlatformClient> = match &config.line_channel_token {
        Some(token) => Arc::new(LinePlatformClient::new(
            token.clone(),
            &config.line_api_base,
        )?),
        None => {
            tracing::warn!("LINE_CHANNEL_TOKEN not set. Replies will only be logged.");
            Arc::new(LoggingPlatformClient)
        }
    };

    let manager = Arc::new(RuntimeManager::new(
        store.clone(),
        gateway.clone(),
        Arc::new(FlexTicketRenderer::new(config.ticket_image_url.clone())),
        Arc::new(config.prompts.clone()),
        config.keywords.confirm.clone(),
        config.session_ttl,
    ));
    let dispatcher = Dispatcher::new(config.keywords.clone(), manager, gateway, platform);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_session_sweeper(store, SESSION_SWEEP_INTERVAL, shutdown.clone());

    let state = AppState::new(db, Arc::new(dispatcher));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("eventline server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    sweeper.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
