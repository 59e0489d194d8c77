use crate::common::TestApp;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

fn sign(public_url: &str, fields: &BTreeMap<&str, &str>, secret: &str) -> String {
    let mut payload = public_url.to_string();
    let mut sorted: BTreeMap<&str, &str> = BTreeMap::new();
    for (k, v) in fields {
        sorted.insert(k, v);
    }
    for (key, value) in &sorted {
        payload.push_str(key);
        payload.push_str(value);
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn rejects_an_inbound_webhook_with_a_bad_signature() {
    let app = TestApp::spawn().await;

    let mut fields = BTreeMap::new();
    fields.insert("From", "whatsapp:+15550001111");
    fields.insert("To", "whatsapp:+15559998888");
    fields.insert("Body", "hello there");
    fields.insert("MessageSid", "SMtest0000000000000000000000001");

    let response = app
        .client
        .post(app.url("/webhooks/wa/inbound/form"))
        .header("x-provider-signature", "not-a-real-signature")
        .form(&fields)
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 401);
    assert!(app.whatsapp.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn accepts_a_correctly_signed_inbound_webhook() {
    let app = TestApp::spawn().await;

    let mut fields = BTreeMap::new();
    fields.insert("From", "whatsapp:+15550002222");
    fields.insert("To", "whatsapp:+15559997777");
    fields.insert("Body", "hi, what are your hours?");
    fields.insert("MessageSid", "SMtest0000000000000000000000002");

    let public_url = format!("{}/webhooks/wa/inbound/form", app.address.replace("http://", "https://"));
    let secret = app.config.webhook.provider_auth_token.expose_secret();
    let signature = sign(&public_url, &fields, secret);

    let response = app
        .client
        .post(app.url("/webhooks/wa/inbound/form"))
        .header("host", app.address.trim_start_matches("http://"))
        .header("x-provider-signature", signature)
        .form(&fields)
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn rejects_the_json_variant_when_disabled() {
    let app = TestApp::spawn().await;
    if app.config.webhook.allow_json_variant {
        return;
    }

    let response = app
        .client
        .post(app.url("/webhooks/wa/inbound/json"))
        .json(&serde_json::json!({
            "from": "whatsapp:+15550003333",
            "to": "whatsapp:+15559996666",
            "body": "hello",
            "message_sid": "SMtest0000000000000000000000003",
        }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 404);
}
