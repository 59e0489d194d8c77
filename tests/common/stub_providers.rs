//! In-memory stand-ins for the external collaborators in `autowa::providers`,
//! used so integration tests never make a real network call.

use async_trait::async_trait;
use autowa::error::Result;
use autowa::providers::{CalendarEvent, CalendarProvider, EmbeddingProvider, LlmMessage, LlmProvider, OcrProvider, OutboundMessage, WhatsAppProvider};
use secrecy::SecretString;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct StubLlm {
    pub next_json: Mutex<Option<serde_json::Value>>,
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String> {
        Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
    }

    async fn complete_json(&self, _messages: &[LlmMessage]) -> Result<serde_json::Value> {
        Ok(self.next_json.lock().unwrap().clone().unwrap_or_else(|| serde_json::json!({})))
    }
}

/// Deterministic embedding: hashes the text into a fixed-size vector so
/// repeated calls with the same input are stable without calling out.
pub struct StubEmbedder {
    pub dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut seed: u64 = 1469598103934665603;
        for byte in text.bytes() {
            seed ^= byte as u64;
            seed = seed.wrapping_mul(1099511628211);
        }
        Ok((0..self.dimension)
            .map(|i| (((seed.wrapping_add(i as u64)) % 1000) as f32) / 1000.0)
            .collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct StubOcr;

#[async_trait]
impl OcrProvider for StubOcr {
    async fn extract_text(&self, _input_path: &Path, _language: &str) -> Result<String> {
        Ok("stub ocr text".to_string())
    }
}

#[derive(Default)]
pub struct StubWhatsApp {
    pub sent: Mutex<Vec<OutboundMessage>>,
    counter: AtomicUsize,
}

#[async_trait]
impl WhatsAppProvider for StubWhatsApp {
    async fn send(&self, message: &OutboundMessage) -> Result<String> {
        self.sent.lock().unwrap().push(message.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("stub-sid-{n}"))
    }
}

#[derive(Default)]
pub struct StubCalendar;

#[async_trait]
impl CalendarProvider for StubCalendar {
    async fn create_event(&self, _access_token: &SecretString, _event: &CalendarEvent) -> Result<String> {
        Ok("stub-event-id".to_string())
    }
}
