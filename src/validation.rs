//! Input validation shared across handlers and services.

use crate::error::{Error, Result, ValidationErrors};

fn single(field: &str, message: impl Into<String>) -> Error {
    Error::Validation(ValidationErrors::Single {
        field: field.to_string(),
        message: message.into(),
    })
}

/// Normalizes a raw `From`/`To` webhook field into `whatsapp:+E164`.
///
/// Accepts `whatsapp:+5491122334455`, `+5491122334455`, or bare digits and
/// always returns the `whatsapp:` prefixed canonical form.
pub fn normalize_whatsapp_phone(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(single("phone", "phone number cannot be empty"));
    }
    let without_prefix = raw.strip_prefix("whatsapp:").unwrap_or(raw);
    let digits: String = without_prefix.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 || digits.len() > 15 {
        return Err(single("phone", format!("invalid E.164 phone: {raw}")));
    }
    Ok(format!("whatsapp:+{digits}"))
}

/// Masks a phone number for logs, keeping the country+area prefix visible
/// and redacting the subscriber digits (§4.9).
pub fn mask_phone_for_logs(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 5 {
        return "***".to_string();
    }
    let visible: String = digits[..5].iter().collect();
    format!("+{visible}{}", "*".repeat(digits.len() - 5))
}

/// Validates a webhook body text field (`Body` ≤ 2000 chars, §6.1).
pub fn validate_webhook_body(body: &str) -> Result<()> {
    if body.chars().count() > 2000 {
        return Err(single("Body", "message body exceeds 2000 characters"));
    }
    Ok(())
}

/// Validates a retrieval/orchestrator query string length (§4.3, §8).
pub fn validate_query_len(query: &str, max_len: usize) -> Result<()> {
    if query.chars().count() > max_len {
        return Err(Error::PayloadTooLarge(query.len()));
    }
    Ok(())
}

/// Clamps `top_k` to the configured maximum rather than erroring (§8: "spec
/// mandates clamp").
pub fn clamp_top_k(top_k: usize, max_top_k: usize) -> usize {
    top_k.min(max_top_k).max(1)
}

/// Validates an idempotency key: non-empty, ≤ 64 bytes (§4.6).
pub fn validate_idempotency_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(single("idempotency_key", "idempotency_key cannot be empty"));
    }
    if key.len() > 64 {
        return Err(single(
            "idempotency_key",
            "idempotency_key must be at most 64 characters",
        ));
    }
    Ok(())
}

/// Validates `create_order` delivery requirements (§4.6): `delivery_method`
/// must be `pickup` or `delivery`, and `delivery` requires a non-blank
/// `address`.
pub fn validate_order_delivery(delivery_method: &str, address: Option<&str>) -> Result<()> {
    if delivery_method != "pickup" && delivery_method != "delivery" {
        return Err(single(
            "delivery_method",
            format!("delivery_method must be 'pickup' or 'delivery', got '{delivery_method}'"),
        ));
    }
    if delivery_method == "delivery" && address.map(str::trim).unwrap_or("").is_empty() {
        return Err(single("address", "address is required when delivery_method is delivery"));
    }
    Ok(())
}

/// Checks a user-provided MIME string against the ingestion allow-list
/// (§4.4): pdf, plain text, office word, csv, json.
pub fn validate_upload_mime(mime: &str) -> Result<()> {
    const ALLOWED: &[&str] = &[
        "application/pdf",
        "text/plain",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "text/csv",
        "application/json",
    ];
    if ALLOWED.contains(&mime) {
        Ok(())
    } else {
        Err(single("mime_type", format!("unsupported MIME type: {mime}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_plus_phone() {
        assert_eq!(
            normalize_whatsapp_phone("+5491122334455").unwrap(),
            "whatsapp:+5491122334455"
        );
    }

    #[test]
    fn normalizes_already_prefixed_phone() {
        assert_eq!(
            normalize_whatsapp_phone("whatsapp:+5491122334455").unwrap(),
            "whatsapp:+5491122334455"
        );
    }

    #[test]
    fn rejects_too_short_phone() {
        assert!(normalize_whatsapp_phone("+123").is_err());
    }

    #[test]
    fn masks_phone_keeping_prefix() {
        let masked = mask_phone_for_logs("whatsapp:+5491122334455");
        assert!(masked.starts_with("+54911"));
        assert!(masked.contains('*'));
    }

    #[test]
    fn clamps_top_k_to_max() {
        assert_eq!(clamp_top_k(51, 50), 50);
        assert_eq!(clamp_top_k(0, 50), 1);
        assert_eq!(clamp_top_k(10, 50), 10);
    }

    #[test]
    fn accepts_pickup_without_address() {
        assert!(validate_order_delivery("pickup", None).is_ok());
    }

    #[test]
    fn rejects_delivery_without_address() {
        assert!(validate_order_delivery("delivery", None).is_err());
        assert!(validate_order_delivery("delivery", Some("   ")).is_err());
    }

    #[test]
    fn accepts_delivery_with_address() {
        assert!(validate_order_delivery("delivery", Some("123 Main St")).is_ok());
    }

    #[test]
    fn rejects_unknown_delivery_method() {
        assert!(validate_order_delivery("teleport", None).is_err());
    }

    #[test]
    fn rejects_oversized_idempotency_key() {
        let key = "a".repeat(65);
        assert!(validate_idempotency_key(&key).is_err());
    }

    #[test]
    fn accepts_known_mime_types() {
        assert!(validate_upload_mime("application/pdf").is_ok());
        assert!(validate_upload_mime("application/x-executable").is_err());
    }
}
