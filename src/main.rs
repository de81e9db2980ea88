//! Storefront Payments - Main Application Entry Point
//!
//! REST API server that creates payments for store orders and consumes
//! provider webhooks.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: HS256 bearer tokens; HMAC-SHA256 webhook signatures
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load and validate configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use storefront_payments::{
    app::{self, AppState},
    config::Config,
    db,
    middleware::auth::TokenVerifier,
    services::{gateway::ProviderGateway, payment_service::PaymentService},
    store::{PgOrderReader, PgPaymentStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let payments = PaymentService::new(
        Arc::new(PgPaymentStore::new(pool.clone())),
        Arc::new(PgOrderReader::new(pool)),
        ProviderGateway::new(config.gateway_timeout()),
        config.default_currency.clone(),
    );

    let state = AppState {
        payments,
        tokens: TokenVerifier::new(&config.secret_key),
        webhook_secret: config.payment_webhook_secret.clone(),
    };

    let app = app::build_router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
