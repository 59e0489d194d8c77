//! Typed per-action payloads (§4.6). Kept separate from the wire/LLM-facing
//! slot representation so a malformed slot never reaches the executor as a
//! loosely-typed map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku_or_name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderPayload {
    pub items: Vec<OrderLine>,
    pub delivery_method: String,
    pub address: Option<String>,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleVisitPayload {
    pub property_id: uuid::Uuid,
    pub preferred_datetime: DateTime<Utc>,
    pub contact_info: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAppointmentPayload {
    pub service_type_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub client_name: String,
    pub client_contact: serde_json::Value,
}
