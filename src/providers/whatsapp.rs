//! Outbound WhatsApp transport (§4.8, §6.1). The inbound side arrives as a
//! webhook handled in `router`; this is the reply path back out.

use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: String,
    pub from: String,
    pub body: String,
}

#[async_trait]
pub trait WhatsAppProvider: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<String>;
}

pub struct WhatsAppTwilioProvider {
    client: reqwest::Client,
    account_sid: String,
    auth_token: SecretString,
}

impl WhatsAppTwilioProvider {
    pub fn new(client: reqwest::Client, account_sid: String, auth_token: SecretString) -> Self {
        Self { client, account_sid, auth_token }
    }
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

#[async_trait]
impl WhatsAppProvider for WhatsAppTwilioProvider {
    async fn send(&self, message: &OutboundMessage) -> Result<String> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", message.to.as_str()), ("From", message.from.as_str()), ("Body", message.body.as_str())])
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("whatsapp send failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "whatsapp provider returned status {}",
                response.status()
            )));
        }

        let parsed: TwilioMessageResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("malformed whatsapp response: {e}")))?;

        Ok(parsed.sid)
    }
}
