//! Lexical (BM25-like) search over the `chunks.tsv` generated column, using
//! an accent-folding text search configuration so "café" matches "cafe"
//! (§4.3).

use super::filters::apply_filters;
use super::pagination::{self, Cursor};
use super::SearchRequest;
use crate::config::RetrievalConfig;
use crate::database::DbPool;
use crate::error::Result;
use crate::models::{SearchHit, SearchMethod};
use sqlx::{Postgres, QueryBuilder, Row};

/// The text search configuration created by migrations, built on
/// `pg_catalog.simple` with `unaccent` folding applied ahead of tokenizing.
const TS_CONFIG: &str = "autowa_unaccent";

pub async fn search(
    pool: &DbPool,
    req: &SearchRequest,
    config: &RetrievalConfig,
    limit: usize,
) -> Result<Vec<SearchHit>> {
    let _ = config;
    let mut builder = build_base_query(req);
    builder.push(" ORDER BY score DESC, c.id DESC LIMIT ");
    builder.push_bind(limit as i64);

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows_to_hits(rows))
}

pub async fn search_page(
    pool: &DbPool,
    req: &SearchRequest,
    config: &RetrievalConfig,
    top_k: usize,
    query_hash: &str,
) -> Result<(Vec<SearchHit>, Option<Cursor>)> {
    let _ = config;
    let mut builder = build_base_query(req);

    let (last_score, last_chunk_id) = pagination::keyset_offset(&req.cursor);
    if let (Some(score), Some(chunk_id)) = (last_score, last_chunk_id) {
        builder.push(" AND (score, c.id) < (");
        builder.push_bind(score);
        builder.push(", ");
        builder.push_bind(chunk_id);
        builder.push(")");
    }

    builder.push(" ORDER BY score DESC, c.id DESC LIMIT ");
    // Fetch one extra row to detect whether another page follows.
    builder.push_bind((top_k + 1) as i64);

    let rows = builder.build().fetch_all(pool).await?;
    let mut hits = rows_to_hits(rows);

    let next_cursor = if hits.len() > top_k {
        hits.truncate(top_k);
        hits.last().map(|last| pagination::keyset_cursor(query_hash, last))
    } else {
        None
    };

    Ok((hits, next_cursor))
}

fn build_base_query<'a>(req: &'a SearchRequest) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT c.id, c.document_id, c.text, c.meta, \
         ts_rank_cd(c.tsv, websearch_to_tsquery(",
    );
    builder.push_bind(TS_CONFIG);
    builder.push(", ");
    builder.push_bind(&req.query);
    builder.push(")) AS score FROM chunks c WHERE c.workspace_id = ");
    builder.push_bind(req.workspace_id);
    builder.push(" AND c.deleted_at IS NULL AND c.tsv @@ websearch_to_tsquery(");
    builder.push_bind(TS_CONFIG);
    builder.push(", ");
    builder.push_bind(&req.query);
    builder.push(")");

    apply_filters(&mut builder, &req.filters);
    builder
}

fn rows_to_hits(rows: Vec<sqlx::postgres::PgRow>) -> Vec<SearchHit> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| SearchHit {
            chunk_id: row.get("id"),
            document_id: row.get("document_id"),
            text: row.get("text"),
            meta: row.get("meta"),
            score: row.get::<f32, _>("score") as f64,
            rank: i + 1,
            search_method: SearchMethod::Bm25,
        })
        .collect()
}
