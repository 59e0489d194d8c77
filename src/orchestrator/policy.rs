//! Per-vertical policy: which slots gate which action, how many times to
//! ask before giving up, and whether retrieval must run before acting
//! (§4.7).

use crate::models::Vertical;

#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub action_name: &'static str,
    pub required_slots: &'static [&'static str],
    pub optional_slots: &'static [&'static str],
    pub max_attempts: i32,
    pub needs_rag_before_action: bool,
    pub system_prompt: &'static str,
}

pub fn policy_for(vertical: Vertical) -> PolicyConfig {
    match vertical {
        Vertical::FoodService => PolicyConfig {
            action_name: "create_order",
            required_slots: &["category", "items", "delivery_method", "payment_method"],
            optional_slots: &["address"],
            max_attempts: 3,
            needs_rag_before_action: true,
            system_prompt: "You are taking a food order over WhatsApp. Confirm items, delivery method, and payment method before placing the order. Keep replies short.",
        },
        Vertical::RealEstate => PolicyConfig {
            action_name: "schedule_visit",
            required_slots: &["operation", "type", "zone", "visit_property_id", "visit_datetime"],
            optional_slots: &["budget_min", "budget_max", "bedrooms"],
            max_attempts: 3,
            needs_rag_before_action: true,
            system_prompt: "You are scheduling a property visit over WhatsApp. Confirm the property and a preferred date/time before booking.",
        },
        Vertical::PersonalServices => PolicyConfig {
            action_name: "schedule_appointment",
            required_slots: &["service_type", "preferred_date", "preferred_time", "client_name"],
            optional_slots: &["client_email", "client_phone", "staff_preference"],
            max_attempts: 3,
            needs_rag_before_action: true,
            system_prompt: "You are booking a service appointment over WhatsApp. Confirm the service, date/time, and client name before booking.",
        },
    }
}

/// Slot named `address` gates on `delivery_method == "delivery"` rather than
/// being unconditionally required (§4.7 table footnote).
pub fn address_required(slots: &std::collections::HashMap<String, crate::models::SlotValue>) -> bool {
    slots.get("delivery_method").and_then(|v| v.as_str()).map(|m| m == "delivery").unwrap_or(false)
}
