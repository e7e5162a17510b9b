//! Maven Registry - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use maven_registry_backend::{
    api::{self, AppState},
    config::Config,
    db,
    error::Result,
    services::{
        package_file_service::PgPackageFileStore, package_service::PgPackageStore,
    },
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_level);
    tracing::info!(?config, "Starting Maven registry");

    // Connect to database
    let db_pool = db::create_pool(&config.database_url, config.store_timeout()).await?;
    tracing::info!("Connected to database");

    db::run_migrations(&db_pool).await?;
    tracing::info!("Database migrations complete");

    tokio::fs::create_dir_all(&config.storage_path).await?;
    tokio::fs::create_dir_all(&config.upload_temp_path).await?;

    let state = Arc::new(AppState::from_config(
        &config,
        Arc::new(PgPackageStore::new(db_pool.clone())),
        Arc::new(PgPackageFileStore::new(db_pool)),
    ));
    tracing::info!(
        temp_path = %state.upload_proxy.temp_path().display(),
        "Upload proxy configured"
    );

    let app = api::routes::create_router(state);

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
