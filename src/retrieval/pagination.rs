//! Opaque pagination cursors (§4.3). Two shapes share one envelope: a
//! keyset cursor (last score + chunk id, used for pure lexical paging,
//! which is always freshly computed from the database) and a hybrid-index
//! cursor (a plain offset into the fused-and-diversified in-memory list,
//! since RRF + MMR ranks cannot be resumed with a database keyset).

use crate::error::{Error, Result};
use crate::models::SearchHit;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use super::filters::Filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationMode {
    Keyset,
    HybridIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorPayload {
    query_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_chunk_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor(CursorPayload);

impl Cursor {
    pub fn query_hash(&self) -> &str {
        &self.0.query_hash
    }

    fn keyset(query_hash: String, last_score: f64, last_chunk_id: Uuid) -> Self {
        Self(CursorPayload {
            query_hash,
            last_score: Some(last_score),
            last_chunk_id: Some(last_chunk_id),
            offset: None,
        })
    }

    fn hybrid(query_hash: String, offset: usize) -> Self {
        Self(CursorPayload { query_hash, last_score: None, last_chunk_id: None, offset: Some(offset) })
    }

    fn encode(&self) -> String {
        let json = serde_json::to_vec(&self.0).expect("cursor payload always serializes");
        URL_SAFE_NO_PAD.encode(json)
    }

    fn decode(raw: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| Error::Validation(crate::error::ValidationErrors::Single {
                field: "cursor".to_string(),
                message: "malformed pagination cursor".to_string(),
            }))?;
        let payload: CursorPayload = serde_json::from_slice(&bytes).map_err(|_| {
            Error::Validation(crate::error::ValidationErrors::Single {
                field: "cursor".to_string(),
                message: "malformed pagination cursor".to_string(),
            })
        })?;
        Ok(Self(payload))
    }
}

impl TryFrom<String> for Cursor {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Cursor::decode(&value)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.encode()
    }
}

/// Deterministic hash binding a cursor to the exact query it was issued
/// for; a cursor replayed against a different query is rejected (§4.3).
pub fn query_hash(query: &str, filters: &HashMap<String, Filter>, workspace_id: Uuid, hybrid: bool) -> String {
    let mut sorted_filters: Vec<(&String, &Filter)> = filters.iter().collect();
    sorted_filters.sort_by(|a, b| a.0.cmp(b.0));
    let canonical = serde_json::json!({
        "workspace_id": workspace_id,
        "query": query,
        "hybrid": hybrid,
        "filters": sorted_filters.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Vec<_>>(),
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub fn keyset_cursor(query_hash: &str, last: &SearchHit) -> Cursor {
    Cursor::keyset(query_hash.to_string(), last.score, last.chunk_id)
}

/// Slices a fused-and-diversified candidate pool by an in-memory offset
/// cursor, returning the requested page and the cursor for the next one.
pub fn slice_hybrid(
    pool: Vec<SearchHit>,
    cursor: &Option<Cursor>,
    page_size: usize,
    query_hash: &str,
) -> (Vec<SearchHit>, Option<Cursor>) {
    let start = cursor.as_ref().and_then(|c| c.0.offset).unwrap_or(0);
    let end = (start + page_size).min(pool.len());
    let page = if start < pool.len() { pool[start..end].to_vec() } else { vec![] };
    let next = if end < pool.len() { Some(Cursor::hybrid(query_hash.to_string(), end)) } else { None };
    (page, next)
}

pub fn keyset_offset(cursor: &Option<Cursor>) -> (Option<f64>, Option<Uuid>) {
    match cursor {
        Some(c) => (c.0.last_score, c.0.last_chunk_id),
        None => (None, None),
    }
}
