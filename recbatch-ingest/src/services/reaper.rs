//! Periodic expiry sweep
//!
//! Storage hygiene only: flips long-lapsed pending slots to expired so
//! abandoned reservations don't accumulate. The upload path performs the
//! same transition lazily on access, so nothing depends on this task
//! running.

use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::db;

/// How often the sweep runs
pub const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the background sweep task
pub fn spawn_expiry_reaper(db: SqlitePool, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match db::slots::expire_stale_slots(&db, Utc::now()).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Expired lapsed upload slots"),
                Err(e) => tracing::warn!("Expiry sweep failed: {}", e),
            }
        }
    })
}
