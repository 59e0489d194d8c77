use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Processing,
    Success,
    Failed,
    Cancelled,
}

/// Idempotent business-operation log (§3.1); unique per `(workspace,
/// idempotency_key)` (invariant 5).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActionExecution {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub conversation_id: Uuid,
    pub action_name: String,
    pub idempotency_key: String,
    pub status: ActionStatus,
    pub summary: Option<String>,
    /// includes the payload fingerprint (SHA256 of sorted JSON)
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub action_execution_id: Uuid,
    pub items: serde_json::Value,
    pub total: rust_decimal::Decimal,
    pub delivery_method: String,
    pub address: Option<String>,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Visit {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub action_execution_id: Uuid,
    pub property_id: Uuid,
    pub preferred_datetime: DateTime<Utc>,
    pub contact_info: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub action_execution_id: Uuid,
    pub service_type_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub client_name: String,
    pub client_contact: serde_json::Value,
    pub google_event_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Written transactionally with the domain row; drained by an
/// out-of-scope delivery worker (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}
