//! LLM backend used for slot extraction and response composition (§4.7).

use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Free-form chat completion, used for natural-language response
    /// composition.
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String>;

    /// Structured completion constrained to JSON, used for slot extraction.
    /// Implementations should request the backend's JSON mode when it has
    /// one; callers are still responsible for validating the shape.
    async fn complete_json(&self, messages: &[LlmMessage]) -> Result<serde_json::Value>;
}

pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(client: reqwest::Client, base_url: String, api_key: SecretString, model: String) -> Self {
        Self { client, base_url, api_key, model }
    }

    async fn chat(&self, messages: &[LlmMessage], json_mode: bool) -> Result<String> {
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [LlmMessage],
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<ResponseFormat>,
        }
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }
        #[derive(Deserialize)]
        struct ChatChoice {
            message: LlmMessage,
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&ChatRequest {
                model: &self.model,
                messages,
                response_format: json_mode.then_some(ResponseFormat { kind: "json_object" }),
            })
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("llm request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!("llm backend returned status {}", response.status())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("malformed llm response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::UpstreamUnavailable("llm backend returned no choices".to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String> {
        self.chat(messages, false).await
    }

    async fn complete_json(&self, messages: &[LlmMessage]) -> Result<serde_json::Value> {
        let raw = self.chat(messages, true).await?;
        serde_json::from_str(&raw).map_err(Error::Json)
    }
}
