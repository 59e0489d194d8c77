use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub channel_id: Uuid,
    pub contact_id: Uuid,
    pub status: ConversationStatus,
    pub last_message_at: DateTime<Utc>,
    pub total_messages: i64,
    pub last_message_text: Option<String>,
    pub last_message_sender: Option<String>,
}

/// A single scalar slot value (§9: "never a free-form map at compile time").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum SlotValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Decimal(rust_decimal::Decimal),
}

impl SlotValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SlotValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Mutable per-conversation state; exactly one latest row per conversation
/// (§3.1, §3.2 invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationSlots {
    pub conversation_id: Uuid,
    pub workspace_id: Uuid,
    /// Stored as jsonb; decoded into `HashMap<String, SlotValue>` at the
    /// orchestrator boundary.
    pub slots: serde_json::Value,
    pub objective: Option<String>,
    pub greeted: bool,
    pub attempts_count: i32,
    pub last_action: Option<String>,
    pub updated_at: DateTime<Utc>,
}
