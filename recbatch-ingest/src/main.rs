//! recbatch-ingest - Recordings Ingest Microservice
//!
//! Mock ingest pipeline for audio recordings with associated metadata:
//! presigned uploads into batches, content-addressed blob storage, and
//! batch-scoped recording registration.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use recbatch_ingest::config::{CliArgs, ServiceConfig};
use recbatch_ingest::services::reaper;
use recbatch_ingest::{build_router, AppState, BlobStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting recbatch-ingest (Recordings Ingest) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = CliArgs::parse();
    let config = ServiceConfig::resolve(&args)?;

    std::fs::create_dir_all(&config.root_folder)?;
    info!("Root folder: {}", config.root_folder.display());

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = recbatch_ingest::db::init_database_pool(&db_path).await?;

    let store = BlobStore::new(config.storage_dir());
    store.ensure_directory_exists()?;
    info!("Blob storage: {}", config.storage_dir().display());

    // Storage hygiene only; expiry correctness is enforced on the upload path
    reaper::spawn_expiry_reaper(db_pool.clone(), reaper::REAP_INTERVAL);

    let bind_address = config.bind_address();
    let state = AppState::new(db_pool, store, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
