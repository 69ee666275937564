use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod error;
mod geocoding;
mod jwt;
mod middleware;
mod models;
mod password;
mod routes;
mod state;
mod validation;

use common::database::{DatabaseConfig, health_check, init_pool};
use places::{OwnershipStore, PgBackend, TransactionConfig};
use tokio::net::TcpListener;

use crate::{
    config::ServerConfig,
    geocoding::GoogleGeocoder,
    jwt::{JwtConfig, JwtService},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting places API service");

    let server_config = ServerConfig::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let backend = PgBackend::new(pool, TransactionConfig::from_env());
    backend.migrate().await?;

    let app_state = AppState {
        store: OwnershipStore::new(Arc::new(backend)),
        jwt_service: JwtService::new(JwtConfig::from_env()?),
        geocoder: Arc::new(GoogleGeocoder::from_env()?),
    };

    info!("Places API service initialized successfully");

    let app = routes::create_router(app_state);

    let address = server_config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Places API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
