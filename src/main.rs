//! Corpsite - corporate website with a content-management backend

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use corpsite::{
    api::{self, AppState},
    config::Config,
    db,
    relay::EventRelay,
    services::email::mailer_from_config,
};

/// Expired refresh tokens and limiter entries are swept this often
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corpsite=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Corpsite...");

    // Load configuration (file, then CORPSITE_* environment overrides)
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");
    if config.auth.uses_default_secret() {
        tracing::warn!("auth.jwt_secret is the built-in default; set CORPSITE_AUTH_JWT_SECRET in production");
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let mailer = mailer_from_config(&config.smtp)?;

    let state = AppState::new(&config, pool, mailer)?;

    // Token and rate limiter cleanup task
    {
        let auth = state.auth.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                if let Err(e) = auth.cleanup_expired_tokens().await {
                    tracing::warn!("Token cleanup failed: {}", e);
                }
            }
        });
    }

    let relay = state.relay.clone();
    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(relay))
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Waits for Ctrl-C, then ends open SSE streams so connections can drain
async fn shutdown_signal(relay: EventRelay) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
    relay.close();
}
