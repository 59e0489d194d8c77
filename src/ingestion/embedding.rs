//! Embedding generation step (§4.4): embeds every chunk of a revision that
//! doesn't have one yet, bounded by a concurrency limit so one large
//! document can't starve the embedding backend's rate limit.

use crate::database::DbPool;
use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::queries::chunks as chunk_queries;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use uuid::Uuid;

pub async fn embed_missing_chunks(
    pool: &DbPool,
    workspace_id: Uuid,
    document_id: Uuid,
    revision: i32,
    embedder: &Arc<dyn EmbeddingProvider>,
    concurrency: usize,
) -> Result<usize> {
    let mut conn = pool.acquire().await?;
    let pending = chunk_queries::chunks_without_embedding(&mut conn, document_id, revision).await?;
    drop(conn);

    if pending.is_empty() {
        return Ok(0);
    }

    let embedded = stream::iter(pending.into_iter().map(|chunk| {
        let pool = pool.clone();
        let embedder = Arc::clone(embedder);
        async move {
            let vector = embedder.embed(&chunk.text).await?;
            let mut conn = pool.acquire().await?;
            chunk_queries::insert_embedding_if_absent(
                &mut conn,
                chunk.id,
                workspace_id,
                document_id,
                pgvector::Vector::from(vector),
            )
            .await
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .try_collect::<Vec<()>>()
    .await?;

    Ok(embedded.len())
}
