use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-vertical catalogs consulted by the action executor for validation
/// and pricing (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MenuItem {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: rust_decimal::Decimal,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Property {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub operation: String,
    pub property_type: String,
    pub zone: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceType {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StaffMember {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub active: bool,
    pub private_calendar_id: Option<String>,
}
