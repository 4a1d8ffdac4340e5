//! Scheduled cleanup of expired revocation entries.

use crate::db::Database;
use crate::jwt::unix_now;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
pub async fn run_cleanup(db: &Database) {
    // A revoked token that has expired can no longer verify, so its entry is dead weight.
    match db.revocations().purge_expired(unix_now()).await {
        Ok(count) if count > 0 => info!("Purged {} expired revocation entries", count),
        Ok(_) => {}
        Err(e) => error!("Failed to purge revocation entries: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
