//! Inbound WhatsApp webhook ingress (§6.1), handed straight to the
//! `MessageRouter` once the provider signature has been verified.

use crate::error::{Error, Result};
use crate::router::InboundWebhook;
use crate::state::AppState;
use axum::extract::{Form, Json, State};
use axum::http::StatusCode;
use axum_extra::headers::Host;
use axum_extra::TypedHeader;
use std::collections::BTreeMap;

fn public_url(host: &Host, path: &str) -> String {
    // The provider signs the URL it actually called, which in production is
    // always behind TLS; `Host` is what the reverse proxy forwards.
    format!("https://{host}{path}")
}

fn required_field<'a>(fields: &'a BTreeMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation(crate::error::ValidationErrors::Single {
            field: name.to_string(),
            message: "required webhook field missing".to_string(),
        }))
}

/// `POST /webhooks/wa/inbound/form`: the provider's native form-encoded
/// delivery, signed via `X-Provider-Signature`.
pub async fn inbound_form(
    State(state): State<AppState>,
    TypedHeader(host): TypedHeader<Host>,
    headers: axum::http::HeaderMap,
    Form(fields): Form<BTreeMap<String, String>>,
) -> Result<StatusCode> {
    let signature = headers.get("x-provider-signature").and_then(|v| v.to_str().ok()).map(str::to_string);
    let webhook = InboundWebhook { fields: fields.clone(), signature, public_url: public_url(&host, "/webhooks/wa/inbound/form") };
    state.router.verify_signature(&webhook)?;

    let from = required_field(&fields, "From")?;
    let to = required_field(&fields, "To")?;
    let body = required_field(&fields, "Body")?;
    let message_sid = required_field(&fields, "MessageSid")?;

    state.router.handle_inbound(from, to, body, message_sid).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, serde::Deserialize)]
pub struct JsonInboundWebhook {
    pub from: String,
    pub to: String,
    pub body: String,
    pub message_sid: String,
    #[serde(default)]
    pub media_url_0: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
}

/// `POST /webhooks/wa/inbound/json`: an unsigned JSON variant some provider
/// sandboxes use instead of form-encoding, accepted only when
/// `WebhookConfig::allow_json_variant` is set (§4.8).
pub async fn inbound_json(State(state): State<AppState>, Json(payload): Json<JsonInboundWebhook>) -> Result<StatusCode> {
    if !state.config.webhook.allow_json_variant {
        return Err(Error::NotFound("JSON webhook variant is disabled".to_string()));
    }

    state.router.handle_inbound(&payload.from, &payload.to, &payload.body, &payload.message_sid).await?;
    Ok(StatusCode::OK)
}
