use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Segment of a revision, the unit of retrieval (§3.1, Glossary).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chunk {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub document_id: Uuid,
    pub revision: i32,
    pub position: i32,
    pub text: String,
    /// category / price / city / operation, populated during chunking
    /// (SPEC_FULL §11, `smart_document_processor`).
    pub meta: serde_json::Value,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Dense vector per chunk (§3.1). A chunk without an embedding is a valid
/// transient ingestion-in-flight state (invariant 7).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChunkEmbedding {
    pub chunk_id: Uuid,
    pub workspace_id: Uuid,
    pub document_id: Uuid,
    pub vector: pgvector::Vector,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A retrieval hit surfaced to callers; carries the provenance needed for
/// RRF fusion and MMR-light diversity before it is serialized out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub meta: serde_json::Value,
    pub score: f64,
    pub rank: usize,
    pub search_method: SearchMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Bm25,
    Vector,
    Hybrid,
}
