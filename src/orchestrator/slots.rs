//! Slot extraction (§4.7 step 2): a structured LLM call first, falling back
//! to a keyword scan when the backend is unavailable or returns something
//! that doesn't parse as a slot map.

use crate::models::SlotValue;
use crate::providers::{LlmMessage, LlmProvider};
use std::collections::HashMap;
use std::sync::Arc;

use super::policy::PolicyConfig;

pub async fn extract_slots(
    llm: &Arc<dyn LlmProvider>,
    policy: &PolicyConfig,
    message_text: &str,
    known_slots: &HashMap<String, SlotValue>,
) -> HashMap<String, SlotValue> {
    match extract_via_llm(llm, policy, message_text, known_slots).await {
        Ok(slots) if !slots.is_empty() => slots,
        _ => extract_via_keywords(policy, message_text),
    }
}

async fn extract_via_llm(
    llm: &Arc<dyn LlmProvider>,
    policy: &PolicyConfig,
    message_text: &str,
    known_slots: &HashMap<String, SlotValue>,
) -> crate::error::Result<HashMap<String, SlotValue>> {
    let wanted: Vec<&str> = policy.required_slots.iter().chain(policy.optional_slots.iter()).copied().collect();
    let prompt = format!(
        "Extract any of these slots as a flat JSON object of string values, using only keys present in the message: {}. \
         Known so far: {}. Message: {}",
        wanted.join(", "),
        serde_json::to_string(known_slots).unwrap_or_default(),
        message_text,
    );

    let response = llm
        .complete_json(&[
            LlmMessage { role: "system".to_string(), content: "Respond with a single flat JSON object, no prose.".to_string() },
            LlmMessage { role: "user".to_string(), content: prompt },
        ])
        .await?;

    let object = response.as_object().cloned().unwrap_or_default();
    Ok(object
        .into_iter()
        .filter(|(key, _)| wanted.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_str().map(|s| (key, SlotValue::String(s.to_string()))))
        .collect())
}

/// Last-resort extraction when the LLM is unavailable: looks for `key:
/// value` style fragments and bare numbers matching a quantity-shaped slot.
fn extract_via_keywords(policy: &PolicyConfig, message_text: &str) -> HashMap<String, SlotValue> {
    let mut found = HashMap::new();
    let lower = message_text.to_lowercase();
    for slot in policy.required_slots.iter().chain(policy.optional_slots.iter()) {
        let needle = format!("{}:", slot.replace('_', " "));
        if let Some(pos) = lower.find(&needle) {
            let value = message_text[pos + needle.len()..].split(|c| c == ',' || c == '\n').next().unwrap_or("").trim();
            if !value.is_empty() {
                found.insert(slot.to_string(), SlotValue::String(value.to_string()));
            }
        }
    }
    found
}

pub fn missing_required(policy: &PolicyConfig, slots: &HashMap<String, SlotValue>) -> Vec<&'static str> {
    policy.required_slots.iter().copied().filter(|s| !slots.contains_key(*s)).collect()
}
