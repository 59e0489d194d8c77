//! The single-pass decision procedure (§4.7): greet, extract slots,
//! slot-fill-or-ask-human, retrieve context, execute the action, or answer.

use super::policy::{self, PolicyConfig};
use super::rate_guard::RateGuard;
use super::slots;
use crate::actions::payloads::{CreateOrderPayload, OrderLine, ScheduleAppointmentPayload, ScheduleVisitPayload};
use crate::actions::{ActionOutcome, ActionResult};
use crate::error::{Error, Result, ValidationErrors};
use crate::models::{SlotValue, Vertical};
use crate::providers::LlmMessage;
use crate::retrieval::{Filter, SearchRequest};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConversationSnapshot {
    pub conversation_id: Uuid,
    pub workspace_id: Uuid,
    pub vertical: Vertical,
    pub user_input: String,
    pub greeted: bool,
    pub slots: HashMap<String, SlotValue>,
    pub objective: Option<String>,
    pub last_action: Option<String>,
    pub attempts_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextAction {
    Greet,
    SlotFill,
    RetrieveContext,
    ExecuteAction,
    Answer,
    AskHuman,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolCall {
    RetrieveContext { query: String, filters: HashMap<String, Filter> },
    ExecuteAction { action_name: String, payload: serde_json::Value, idempotency_key: String },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DecideResponse {
    pub assistant_text: String,
    pub slots: HashMap<String, SlotValue>,
    pub objective: Option<String>,
    pub attempts_count: i32,
    pub tool_calls: Vec<ToolCall>,
    pub context_used: Vec<String>,
    pub next_action: NextAction,
    pub end: bool,
}

pub async fn run(orch: &super::Orchestrator, snapshot: ConversationSnapshot) -> Result<DecideResponse> {
    guard_rate(&orch.rate_guard, snapshot.conversation_id)?;

    let policy = policy::policy_for(snapshot.vertical);
    let mut slots = snapshot.slots.clone();
    let mut attempts_count = snapshot.attempts_count;
    let mut objective = snapshot.objective.clone();

    // 1. Greet.
    if !snapshot.greeted {
        let assistant_text = compose_greeting(orch, &policy).await?;
        return Ok(DecideResponse {
            assistant_text,
            slots,
            objective,
            attempts_count,
            tool_calls: vec![],
            context_used: vec![],
            next_action: NextAction::Greet,
            end: false,
        });
    }

    // 1.5. Off-hours gate for personal services (§4.7): refuse and propose
    // the configured in-hours window before any slot-filling or booking.
    if snapshot.vertical == Vertical::PersonalServices {
        if let Some(hours) = super::business_hours::fetch(&orch.pool, snapshot.workspace_id).await? {
            if !hours.contains(chrono::Utc::now().time()) {
                return Ok(DecideResponse {
                    assistant_text: hours.refusal_message(),
                    slots,
                    objective,
                    attempts_count,
                    tool_calls: vec![],
                    context_used: vec![],
                    next_action: NextAction::Answer,
                    end: false,
                });
            }
        }
    }

    // 2. Extract slot candidates from this turn's message.
    let extracted = slots::extract_slots(&orch.llm, &policy, &snapshot.user_input, &slots).await;
    let filled_new_slot = extracted.keys().any(|key| !slots.contains_key(key));
    slots.extend(extracted);

    // 3. Slot-fill, or ask a human once attempts are exhausted.
    let missing = missing_required_slots(&policy, &slots);
    if !missing.is_empty() {
        if !filled_new_slot {
            attempts_count += 1;
        }
        if attempts_count > policy.max_attempts {
            return Ok(DecideResponse {
                assistant_text: "Let me get a team member to help you with this.".to_string(),
                slots,
                objective,
                attempts_count,
                tool_calls: vec![],
                context_used: vec![],
                next_action: NextAction::AskHuman,
                end: true,
            });
        }
        return Ok(DecideResponse {
            assistant_text: ask_for_slot(missing[0]),
            slots,
            objective,
            attempts_count,
            tool_calls: vec![],
            context_used: vec![],
            next_action: NextAction::SlotFill,
            end: false,
        });
    }

    // 4. Retrieve context for the current objective, if the policy needs it
    // and we haven't already retrieved for this exact query.
    let query = derive_query(&policy, &slots, &snapshot.user_input);
    let query_objective = format!("{:x}", Sha256::digest(query.as_bytes()));
    if policy.needs_rag_before_action && objective.as_deref() != Some(query_objective.as_str()) {
        let filters = derive_filters(&slots);
        let response = orch
            .retrieval
            .search(SearchRequest {
                workspace_id: snapshot.workspace_id,
                query: query.clone(),
                filters: filters.clone(),
                top_k: orch.config.retrieve_top_k,
                hybrid: true,
                cursor: None,
            })
            .await?;

        let context_used: Vec<String> = response.results.iter().map(|hit| hit.text.clone()).collect();
        let assistant_text = compose_answer(orch, &policy, &snapshot.user_input, &context_used).await?;
        objective = Some(query_objective);

        return Ok(DecideResponse {
            assistant_text,
            slots,
            objective,
            attempts_count,
            tool_calls: vec![ToolCall::RetrieveContext { query, filters }],
            context_used,
            next_action: NextAction::RetrieveContext,
            end: false,
        });
    }

    // 5. All required slots filled and any needed context retrieved:
    // execute the action.
    if let Ok(payload) = build_payload(&policy, &slots) {
        let idempotency_key = deterministic_idempotency_key(snapshot.conversation_id, policy.action_name, &payload);
        let result = execute_action(orch, &policy, snapshot.workspace_id, snapshot.conversation_id, &idempotency_key, payload.clone()).await?;
        return Ok(DecideResponse {
            assistant_text: describe_outcome(&result.outcome),
            slots,
            objective,
            attempts_count,
            tool_calls: vec![ToolCall::ExecuteAction { action_name: policy.action_name.to_string(), payload, idempotency_key }],
            context_used: vec![],
            next_action: NextAction::ExecuteAction,
            end: true,
        });
    }

    // 6. Preconditions for the action don't hold yet (e.g. an unparsable
    // date slipped through extraction): answer instead of erroring out.
    let assistant_text = compose_answer(orch, &policy, &snapshot.user_input, &[]).await?;
    Ok(DecideResponse {
        assistant_text,
        slots,
        objective,
        attempts_count,
        tool_calls: vec![],
        context_used: vec![],
        next_action: NextAction::Answer,
        end: false,
    })
}

fn guard_rate(guard: &RateGuard, conversation_id: Uuid) -> Result<()> {
    guard.check(conversation_id).map_err(|retry_after_ms| Error::RateLimited { retry_after_ms })
}

fn missing_required_slots(policy: &PolicyConfig, slots: &HashMap<String, SlotValue>) -> Vec<&'static str> {
    let mut missing = slots::missing_required(policy, slots);
    if policy.action_name == "create_order" {
        missing.retain(|slot| *slot != "address");
        if policy::address_required(slots) && !slots.contains_key("address") {
            missing.push("address");
        }
    }
    missing
}

fn ask_for_slot(slot: &str) -> String {
    match slot {
        "items" => "What would you like to order?",
        "delivery_method" => "Would you like pickup or delivery?",
        "payment_method" => "How would you like to pay?",
        "address" => "What's the delivery address?",
        "category" => "What category are you interested in?",
        "operation" => "Are you looking to buy or rent?",
        "type" => "What type of property are you looking for?",
        "zone" => "Which area or neighborhood?",
        "visit_property_id" => "Which property would you like to visit?",
        "visit_datetime" => "What date and time works for the visit?",
        "service_type" => "Which service would you like to book?",
        "preferred_date" => "What date works for you?",
        "preferred_time" => "What time works for you?",
        "client_name" => "Could I get your name for the booking?",
        other => return format!("Could you share {}?", other.replace('_', " ")),
    }
    .to_string()
}

fn derive_query(policy: &PolicyConfig, slots: &HashMap<String, SlotValue>, user_input: &str) -> String {
    let mut parts: Vec<String> = policy
        .required_slots
        .iter()
        .chain(policy.optional_slots.iter())
        .filter_map(|slot| slots.get(*slot).and_then(SlotValue::as_str).map(str::to_string))
        .collect();
    parts.push(user_input.to_string());
    parts.join(" ")
}

fn derive_filters(slots: &HashMap<String, SlotValue>) -> HashMap<String, Filter> {
    let mut filters = HashMap::new();
    for key in ["category", "categoria", "zone", "city", "operation"] {
        if let Some(value) = slots.get(key).and_then(SlotValue::as_str) {
            filters.insert(key.to_string(), Filter::Scalar(value.to_string()));
        }
    }
    let min = slots.get("budget_min").and_then(slot_as_f64);
    let max = slots.get("budget_max").and_then(slot_as_f64);
    if min.is_some() || max.is_some() {
        filters.insert("budget".to_string(), Filter::Range { min, max });
    }
    filters
}

fn slot_as_f64(value: &SlotValue) -> Option<f64> {
    match value {
        SlotValue::Float(f) => Some(*f),
        SlotValue::Int(i) => Some(*i as f64),
        SlotValue::String(s) => s.parse().ok(),
        SlotValue::Decimal(d) => d.to_string().parse().ok(),
        _ => None,
    }
}

fn slot_to_json(value: &SlotValue) -> serde_json::Value {
    match value {
        SlotValue::String(s) => serde_json::Value::String(s.clone()),
        SlotValue::Int(i) => serde_json::json!(i),
        SlotValue::Float(f) => serde_json::json!(f),
        SlotValue::Bool(b) => serde_json::json!(b),
        SlotValue::Date(d) => serde_json::json!(d.to_string()),
        SlotValue::Time(t) => serde_json::json!(t.to_string()),
        SlotValue::Decimal(d) => serde_json::json!(d.to_string()),
    }
}

fn missing_field(field: &str) -> Error {
    Error::Validation(ValidationErrors::Single { field: field.to_string(), message: "missing or unparsable".to_string() })
}

fn build_payload(policy: &PolicyConfig, slots: &HashMap<String, SlotValue>) -> Result<serde_json::Value> {
    match policy.action_name {
        "create_order" => build_food_order_payload(slots),
        "schedule_visit" => build_schedule_visit_payload(slots),
        "schedule_appointment" => build_schedule_appointment_payload(slots),
        other => Err(Error::Internal(format!("no payload builder registered for action {other}"))),
    }
}

fn parse_order_items(raw: &str) -> Result<Vec<OrderLine>> {
    raw.split(',')
        .map(|entry| {
            let entry = entry.trim();
            let (name, quantity) = entry.rsplit_once(':').unwrap_or((entry, "1"));
            let name = name.trim();
            if name.is_empty() {
                return Err(missing_field("items"));
            }
            Ok(OrderLine { sku_or_name: name.to_string(), quantity: quantity.trim().parse().unwrap_or(1) })
        })
        .collect()
}

fn build_food_order_payload(slots: &HashMap<String, SlotValue>) -> Result<serde_json::Value> {
    let items = parse_order_items(slots.get("items").and_then(SlotValue::as_str).ok_or_else(|| missing_field("items"))?)?;
    let delivery_method = slots.get("delivery_method").and_then(SlotValue::as_str).unwrap_or("pickup").to_string();
    let payment_method = slots.get("payment_method").and_then(SlotValue::as_str).ok_or_else(|| missing_field("payment_method"))?.to_string();
    let address = slots.get("address").and_then(SlotValue::as_str).map(str::to_string);
    if delivery_method == "delivery" && address.is_none() {
        return Err(missing_field("address"));
    }
    serde_json::to_value(CreateOrderPayload { items, delivery_method, address, payment_method }).map_err(Error::Json)
}

fn build_schedule_visit_payload(slots: &HashMap<String, SlotValue>) -> Result<serde_json::Value> {
    let property_id = slots
        .get("visit_property_id")
        .and_then(SlotValue::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| missing_field("visit_property_id"))?;
    let preferred_datetime = slots
        .get("visit_datetime")
        .and_then(SlotValue::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .ok_or_else(|| missing_field("visit_datetime"))?;

    let mut contact_info = serde_json::Map::new();
    for key in ["budget_min", "budget_max", "bedrooms"] {
        if let Some(value) = slots.get(key) {
            contact_info.insert(key.to_string(), slot_to_json(value));
        }
    }

    serde_json::to_value(ScheduleVisitPayload { property_id, preferred_datetime, contact_info: serde_json::Value::Object(contact_info) })
        .map_err(Error::Json)
}

fn build_schedule_appointment_payload(slots: &HashMap<String, SlotValue>) -> Result<serde_json::Value> {
    let service_type_name = slots.get("service_type").and_then(SlotValue::as_str).ok_or_else(|| missing_field("service_type"))?.to_string();

    let date = match slots.get("preferred_date") {
        Some(SlotValue::Date(d)) => Some(*d),
        Some(SlotValue::String(s)) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
        _ => None,
    }
    .ok_or_else(|| missing_field("preferred_date"))?;
    let time = match slots.get("preferred_time") {
        Some(SlotValue::Time(t)) => Some(*t),
        Some(SlotValue::String(s)) => chrono::NaiveTime::parse_from_str(s, "%H:%M").ok(),
        _ => None,
    }
    .ok_or_else(|| missing_field("preferred_time"))?;
    let scheduled_at = chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(date.and_time(time), chrono::Utc);

    let client_name = slots.get("client_name").and_then(SlotValue::as_str).ok_or_else(|| missing_field("client_name"))?.to_string();

    let mut client_contact = serde_json::Map::new();
    for key in ["client_email", "client_phone", "staff_preference"] {
        if let Some(value) = slots.get(key) {
            client_contact.insert(key.to_string(), slot_to_json(value));
        }
    }

    serde_json::to_value(ScheduleAppointmentPayload { service_type_name, scheduled_at, client_name, client_contact: serde_json::Value::Object(client_contact) })
        .map_err(Error::Json)
}

async fn execute_action(
    orch: &super::Orchestrator,
    policy: &PolicyConfig,
    workspace_id: Uuid,
    conversation_id: Uuid,
    idempotency_key: &str,
    payload: serde_json::Value,
) -> Result<ActionResult> {
    match policy.action_name {
        "create_order" => {
            let payload: CreateOrderPayload = serde_json::from_value(payload)?;
            orch.executor.create_order(workspace_id, conversation_id, idempotency_key, payload).await
        }
        "schedule_visit" => {
            let payload: ScheduleVisitPayload = serde_json::from_value(payload)?;
            orch.executor.schedule_visit(workspace_id, conversation_id, idempotency_key, payload).await
        }
        "schedule_appointment" => {
            let payload: ScheduleAppointmentPayload = serde_json::from_value(payload)?;
            orch.executor.schedule_appointment(workspace_id, conversation_id, idempotency_key, payload).await
        }
        other => Err(Error::Internal(format!("no executor registered for action {other}"))),
    }
}

fn deterministic_idempotency_key(conversation_id: Uuid, action_name: &str, payload: &serde_json::Value) -> String {
    let canonical = serde_jcs::to_string(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(conversation_id.as_bytes());
    hasher.update(action_name.as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn describe_outcome(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::CreateOrder { order } => format!("Your order is confirmed, total {}.", order.total),
        ActionOutcome::ScheduleVisit { visit_id } => format!("Your visit is booked, confirmation {visit_id}."),
        ActionOutcome::ScheduleAppointment { appointment_id, staff_assigned } => match staff_assigned {
            Some(name) => format!("Your appointment with {name} is confirmed, confirmation {appointment_id}."),
            None => format!("Your appointment is confirmed, confirmation {appointment_id}."),
        },
        ActionOutcome::Pending => "We're already working on that request, one moment.".to_string(),
        ActionOutcome::Recorded => "That request has already been recorded.".to_string(),
    }
}

async fn compose_greeting(orch: &super::Orchestrator, policy: &PolicyConfig) -> Result<String> {
    orch.llm
        .complete(&[
            LlmMessage { role: "system".to_string(), content: policy.system_prompt.to_string() },
            LlmMessage { role: "user".to_string(), content: "Greet the customer and briefly say what you can help with.".to_string() },
        ])
        .await
}

async fn compose_answer(orch: &super::Orchestrator, policy: &PolicyConfig, user_input: &str, context: &[String]) -> Result<String> {
    let mut messages = vec![LlmMessage { role: "system".to_string(), content: policy.system_prompt.to_string() }];
    if !context.is_empty() {
        messages.push(LlmMessage {
            role: "system".to_string(),
            content: format!("Use only this context; never invent prices, staff, or hours:\n{}", context.join("\n---\n")),
        });
    }
    messages.push(LlmMessage { role: "user".to_string(), content: user_input.to_string() });
    orch.llm.complete(&messages).await
}
