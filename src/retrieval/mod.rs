//! Retrieval Engine (C4): lexical full-text + dense vector search, RRF
//! fusion, MMR-light diversity, keyset/hybrid pagination, and the filter
//! grammar shared by both primitive searches (§4.3).

pub mod filters;
pub mod fusion;
pub mod lexical;
pub mod mmr;
pub mod pagination;
pub mod vector;

pub use filters::Filter;
pub use pagination::{Cursor, PaginationMode};
pub use vector::VectorSearcher;

use crate::config::RetrievalConfig;
use crate::database::DbPool;
use crate::error::{Error, Result};
use crate::models::{SearchHit, SearchMethod};
use crate::validation::clamp_top_k;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub workspace_id: Uuid,
    pub query: String,
    pub filters: HashMap<String, Filter>,
    pub top_k: usize,
    pub hybrid: bool,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub search_type: SearchMethod,
    pub next_cursor: Option<Cursor>,
    pub degraded: bool,
}

#[derive(Clone)]
pub struct RetrievalEngine {
    pool: DbPool,
    config: RetrievalConfig,
    vector_searcher: VectorSearcher,
}

impl RetrievalEngine {
    pub fn new(pool: DbPool, config: RetrievalConfig, vector_searcher: VectorSearcher) -> Self {
        Self { pool, config, vector_searcher }
    }

    /// Runs the two-primitive-search-then-fuse pipeline described in §4.3.
    pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        if req.query.trim().is_empty() {
            return Ok(SearchResponse { results: vec![], search_type: SearchMethod::Hybrid, next_cursor: None, degraded: false });
        }
        crate::validation::validate_query_len(&req.query, self.config.max_query_len)?;
        let top_k = clamp_top_k(req.top_k, self.config.max_top_k);

        let query_hash = pagination::query_hash(&req.query, &req.filters, req.workspace_id, req.hybrid);
        if let Some(cursor) = &req.cursor {
            if cursor.query_hash() != query_hash {
                return Err(Error::Validation(crate::error::ValidationErrors::Single {
                    field: "cursor".to_string(),
                    message: "cursor does not match the current query".to_string(),
                }));
            }
        }

        if !req.hybrid {
            let (hits, next) = lexical::search_page(&self.pool, &req, &self.config, top_k, &query_hash).await?;
            return Ok(SearchResponse { results: hits, search_type: SearchMethod::Bm25, next_cursor: next, degraded: false });
        }

        let lexical_hits = lexical::search(&self.pool, &req, &self.config, self.config.topn_bm25).await?;
        let vector_attempt = self
            .vector_searcher
            .search(&self.pool, &req, &self.config, &query_hash, self.config.topn_vector)
            .await;

        let (fused, degraded, method) = match vector_attempt {
            Ok(vector_hits) => (
                fusion::reciprocal_rank_fusion(&lexical_hits, &vector_hits, self.config.rrf_k),
                false,
                SearchMethod::Hybrid,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "vector backend unreachable, degrading to lexical-only");
                (lexical_hits, true, SearchMethod::Bm25)
            }
        };

        // Diversify a pool bigger than one page so later pages can still
        // draw from it without re-running the fusion.
        let pool_size = self.config.topn_bm25 + self.config.topn_vector;
        let diversified = mmr::diversify(fused, pool_size);
        let (page, next) = pagination::slice_hybrid(diversified, &req.cursor, top_k, &query_hash);

        Ok(SearchResponse { results: page, search_type: method, next_cursor: next, degraded })
    }
}

/// 1200-char truncation with ellipsis for returned chunk text (§4.3).
pub fn truncate_for_response(text: &str) -> String {
    crate::utils::string::truncate_with_ellipsis(text, 1200)
}
