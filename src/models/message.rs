use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Immutable record (§3.1). `provider_message_id` is unique within a
/// workspace when present (invariant 8); synthetic debounce aggregates use a
/// deterministic suffix so they never collide with a real provider id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub direction: MessageDirection,
    pub message_type: String,
    pub provider_message_id: Option<String>,
    pub content: String,
    pub media_url: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Deterministic synthetic id for a debounce-flushed aggregate message,
    /// so repeated flushes of the same source ids are themselves idempotent.
    pub fn synthetic_provider_id(source_ids: &[String]) -> String {
        format!("synthetic:{}", source_ids.join(","))
    }
}
