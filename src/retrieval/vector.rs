//! Dense vector search over `chunk_embeddings` via pgvector cosine distance
//! (§4.3). The caller embeds the query text once (cached by query hash) and
//! the scan ranks by `1 - cosine_distance`.

use super::filters::apply_filters;
use super::SearchRequest;
use crate::config::RetrievalConfig;
use crate::database::DbPool;
use crate::error::Result;
use crate::models::{SearchHit, SearchMethod};
use crate::providers::EmbeddingProvider;
use sqlx::{Postgres, QueryBuilder, Row};
use std::sync::Arc;

#[derive(Clone)]
pub struct VectorSearcher {
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Arc<dyn crate::ephemeral::EmbeddingCache>,
}

impl VectorSearcher {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, cache: Arc<dyn crate::ephemeral::EmbeddingCache>) -> Self {
        Self { embedder, cache }
    }

    async fn embed_query(&self, req: &SearchRequest, query_hash: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.get(req.workspace_id, query_hash).await? {
            return Ok(cached);
        }
        let vector = self.embedder.embed(&req.query).await?;
        self.cache.set(req.workspace_id, query_hash, &vector, 3600).await?;
        Ok(vector)
    }

    pub async fn search(
        &self,
        pool: &DbPool,
        req: &SearchRequest,
        config: &RetrievalConfig,
        query_hash: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let _ = config;
        let vector = self.embed_query(req, query_hash).await?;
        let vector = pgvector::Vector::from(vector);

        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT c.id, c.document_id, c.text, c.meta, \
             1 - (e.vector <=> ",
        );
        builder.push_bind(vector);
        builder.push(") AS score FROM chunk_embeddings e JOIN chunks c ON c.id = e.chunk_id \
                      WHERE e.workspace_id = ");
        builder.push_bind(req.workspace_id);
        builder.push(" AND e.deleted_at IS NULL AND c.deleted_at IS NULL");

        apply_filters(&mut builder, &req.filters);

        builder.push(" ORDER BY score DESC LIMIT ");
        builder.push_bind(limit as i64);

        let rows = builder.build().fetch_all(pool).await?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| SearchHit {
                chunk_id: row.get("id"),
                document_id: row.get("document_id"),
                text: row.get("text"),
                meta: row.get("meta"),
                score: row.get::<f64, _>("score"),
                rank: i + 1,
                search_method: SearchMethod::Vector,
            })
            .collect())
    }
}
