use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploaded,
    Processing,
    Processed,
    Failed,
    Deleted,
}

/// Uploaded binary (§3.1). The storage layer holds the bytes; this row holds
/// the metadata (§3.3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct File {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub storage_uri: String,
    pub filename: String,
    pub mime_type: String,
    pub sha256: String,
    pub bytes: i64,
    pub status: FileStatus,
    pub attempts: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub purge_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Logical content extracted from a file (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub file_id: Uuid,
    pub title: String,
    pub language: Option<String>,
    pub token_count: Option<i32>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Versioned extracted content; revisions are monotonic per document
/// (invariant 4).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DocumentRevision {
    pub document_id: Uuid,
    pub revision: i32,
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
