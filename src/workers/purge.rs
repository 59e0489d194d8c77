//! Deleted-file janitor (§4.4): past the purge window, cascades the file
//! row through documents, chunks, and embeddings, then removes the on-disk
//! blob.

use crate::database::DbPool;
use crate::ingestion::storage::ContentAddressedStore;
use crate::queries::files as file_queries;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;

const BATCH_SIZE: i64 = 100;

pub async fn purge_worker(pool: DbPool, storage: ContentAddressedStore, poll_interval_seconds: u64, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = interval(Duration::from_secs(poll_interval_seconds));
    tracing::info!("purge worker started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("purge worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(error) = run_once(&pool, &storage).await {
                    tracing::error!(%error, "purge batch failed");
                }
            }
        }
    }
}

async fn run_once(pool: &DbPool, storage: &ContentAddressedStore) -> crate::error::Result<()> {
    loop {
        let mut conn = pool.acquire().await?;
        let file_ids = file_queries::claim_purge_batch(&mut conn, BATCH_SIZE).await?;
        if file_ids.is_empty() {
            return Ok(());
        }
        purge_ids(&mut conn, storage, file_ids).await?;
    }
}

async fn purge_ids(conn: &mut crate::database::DbConn, storage: &ContentAddressedStore, file_ids: Vec<uuid::Uuid>) -> crate::error::Result<()> {
    for file_id in file_ids {
        let blob = file_queries::storage_uri_for_file(conn, file_id).await?;
        file_queries::purge_file_cascade(conn, file_id).await?;
        if let Some((_workspace_id, storage_uri)) = blob {
            if let Err(error) = storage.delete(&storage_uri).await {
                tracing::warn!(%error, %file_id, "failed to delete purged blob");
            }
        }
        tracing::info!(%file_id, "purged deleted file");
    }
    Ok(())
}

/// Admin-triggered purge override (§6.6 `POST /admin/purge-deleted`):
/// ignores each file's individually scheduled `purge_at` and purges
/// anything soft-deleted more than `retention_days` ago. Returns the
/// number of files purged.
pub async fn purge_older_than(pool: &DbPool, storage: &ContentAddressedStore, retention_days: i64) -> crate::error::Result<u64> {
    let mut total = 0u64;
    loop {
        let mut conn = pool.acquire().await?;
        let file_ids = file_queries::claim_purge_batch_older_than(&mut conn, retention_days, BATCH_SIZE).await?;
        if file_ids.is_empty() {
            return Ok(total);
        }
        total += file_ids.len() as u64;
        purge_ids(&mut conn, storage, file_ids).await?;
    }
}
