use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Vertical {
    FoodService,
    RealEstate,
    PersonalServices,
}

/// Tenant root (§3.1). Settings carries the symmetrically-encrypted
/// integration tokens (OAuth, calendar) under `crypto::encrypt`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub display_name: String,
    pub plan_tier: String,
    pub vertical: Vertical,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Binding between a workspace and an external messaging number (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub display_phone: String,
    pub status: String,
}

/// End-user within a workspace, keyed by phone (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub phone: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
