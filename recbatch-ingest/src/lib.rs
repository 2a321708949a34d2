//! recbatch-ingest library interface
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod store;

pub use crate::config::ServiceConfig;
pub use crate::error::{ApiError, ApiResult};
pub use crate::store::BlobStore;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (batches, slots, blobs, recordings)
    pub db: SqlitePool,
    /// Content-addressed blob storage
    pub store: BlobStore,
    /// Resolved service configuration
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, store: BlobStore, config: ServiceConfig) -> Self {
        Self {
            db,
            store,
            config: Arc::new(config),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::presign_routes())
        .merge(api::upload_routes())
        .merge(api::recording_routes())
        .merge(api::batch_routes())
        .merge(api::media_routes())
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
