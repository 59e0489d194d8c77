//! Webhook signature verification (§4.8): HMAC over the effective public URL
//! (resolved behind the reverse proxy) concatenated with alphabetically
//! sorted form field values, compared in constant time.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

fn signed_payload(public_url: &str, fields: &BTreeMap<String, String>) -> String {
    let mut payload = public_url.to_string();
    for (key, value) in fields {
        payload.push_str(key);
        payload.push_str(value);
    }
    payload
}

/// Verifies `provided_signature_b64` against the HMAC-SHA256 of the signed
/// payload. Constant-time so a timing side channel never leaks how many
/// leading bytes matched.
pub fn verify(public_url: &str, fields: &BTreeMap<String, String>, secret: &SecretString, provided_signature_b64: &str) -> Result<()> {
    let payload = signed_payload(public_url, fields);
    let mut mac =
        HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).map_err(|_| Error::Internal("invalid hmac key length".to_string()))?;
    mac.update(payload.as_bytes());
    let expected_b64 = STANDARD.encode(mac.finalize().into_bytes());

    let matches = expected_b64.len() == provided_signature_b64.len()
        && expected_b64.as_bytes().ct_eq(provided_signature_b64.as_bytes()).unwrap_u8() == 1;
    if matches {
        Ok(())
    } else {
        Err(Error::Auth("invalid webhook signature".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let secret = SecretString::from("a-shared-secret-that-is-long-enough".to_string());
        let mut fields = BTreeMap::new();
        fields.insert("Body".to_string(), "hello".to_string());
        fields.insert("From".to_string(), "whatsapp:+15551234567".to_string());

        let payload = signed_payload("https://example.com/webhooks/wa/inbound/form", &fields);
        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        assert!(verify("https://example.com/webhooks/wa/inbound/form", &fields, &secret, &signature).is_ok());
    }

    #[test]
    fn rejects_a_tampered_signature() {
        let secret = SecretString::from("a-shared-secret-that-is-long-enough".to_string());
        let fields = BTreeMap::new();
        assert!(verify("https://example.com/hook", &fields, &secret, "not-the-right-signature").is_err());
    }
}
