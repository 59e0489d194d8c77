//! File-level retry janitor (§4.4): once a file's `next_retry_at` backoff
//! elapses, re-enqueues its pipeline from the extract step. Distinct from the
//! scheduler's own per-job retry/backoff, which covers a single step; this
//! covers the file needing a whole fresh pass after a job exhausted its
//! retries into the DLQ.

use crate::database::DbPool;
use crate::error::Result;
use crate::ingestion::IngestionPipeline;
use crate::queries::files as file_queries;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;

const BATCH_SIZE: i64 = 100;

pub async fn retry_worker(pool: DbPool, pipeline: IngestionPipeline, poll_interval_seconds: u64, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = interval(Duration::from_secs(poll_interval_seconds));
    tracing::info!("file retry worker started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("file retry worker shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(error) = run_once(&pool, &pipeline).await {
                    tracing::error!(%error, "file retry batch failed");
                }
            }
        }
    }
}

async fn run_once(pool: &DbPool, pipeline: &IngestionPipeline) -> Result<()> {
    loop {
        let mut conn = pool.acquire().await?;
        let due = file_queries::claim_retry_batch(&mut conn, BATCH_SIZE).await?;
        drop(conn);
        if due.is_empty() {
            return Ok(());
        }

        for (file_id, workspace_id, document_id) in due {
            if let Err(error) = pipeline.retry_from_extract(workspace_id, document_id).await {
                tracing::error!(%error, %file_id, "failed to re-enqueue file retry");
                continue;
            }
            tracing::info!(%file_id, "re-enqueued file after backoff");
        }
    }
}
