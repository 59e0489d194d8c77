//! Message Router (C9): webhook ingress, signature verification, dedup,
//! debounce, combined-turn synthesis, orchestrator invocation, and outbound
//! send (§4.8).

pub mod signature;

use crate::config::{DebounceConfig, RateLimitConfig, WebhookConfig};
use crate::database::DbPool;
use crate::ephemeral::{BufferedMessage, DebounceBuffer, DedupStore, RateLimiter};
use crate::error::{Error, Result};
use crate::models::{ConversationSlots, Message, MessageDirection, MessageRole, SlotValue};
use crate::orchestrator::{ConversationSnapshot, Orchestrator};
use crate::providers::{OutboundMessage, WhatsAppProvider};
use crate::queries::{conversations as conv_queries, workspaces as workspace_queries};
use crate::validation;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Everything the webhook handler extracts from a single inbound webhook
/// call, before normalization.
#[derive(Debug, Clone)]
pub struct InboundWebhook {
    pub fields: BTreeMap<String, String>,
    pub signature: Option<String>,
    pub public_url: String,
}

pub struct MessageRouter {
    pool: DbPool,
    dedup: Arc<dyn DedupStore>,
    debounce: Arc<dyn DebounceBuffer>,
    ratelimiter: Arc<dyn RateLimiter>,
    whatsapp: Arc<dyn WhatsAppProvider>,
    orchestrator: Arc<Orchestrator>,
    webhook: WebhookConfig,
    debounce_cfg: DebounceConfig,
    ratelimit_cfg: RateLimitConfig,
    pending_flushes: DashMap<(Uuid, String), JoinHandle<()>>,
}

impl MessageRouter {
    pub fn new(
        pool: DbPool,
        dedup: Arc<dyn DedupStore>,
        debounce: Arc<dyn DebounceBuffer>,
        ratelimiter: Arc<dyn RateLimiter>,
        whatsapp: Arc<dyn WhatsAppProvider>,
        orchestrator: Arc<Orchestrator>,
        webhook: WebhookConfig,
        debounce_cfg: DebounceConfig,
        ratelimit_cfg: RateLimitConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            dedup,
            debounce,
            ratelimiter,
            whatsapp,
            orchestrator,
            webhook,
            debounce_cfg,
            ratelimit_cfg,
            pending_flushes: DashMap::new(),
        })
    }

    pub fn verify_signature(&self, webhook: &InboundWebhook) -> Result<()> {
        let signature = webhook.signature.as_deref().ok_or_else(|| Error::Auth("missing webhook signature".to_string()))?;
        signature::verify(&webhook.public_url, &webhook.fields, &self.webhook.provider_auth_token, signature)
    }

    /// Verifies, normalizes, dedups, and debounces one inbound message; on a
    /// flush boundary it synthesizes the combined turn and invokes the
    /// orchestrator. Returns once the message has been durably recorded —
    /// the actual reply may be sent from a spawned delayed-flush task.
    pub async fn handle_inbound(self: &Arc<Self>, from_raw: &str, to_raw: &str, body: &str, provider_message_id: &str) -> Result<()> {
        validation::validate_webhook_body(body)?;
        let from = validation::normalize_whatsapp_phone(from_raw)?;
        let to = validation::normalize_whatsapp_phone(to_raw)?;

        let channel = workspace_queries::get_channel_by_display_phone(&self.pool, &to).await?;
        let workspace_id = channel.workspace_id;

        self.check_rate_limits(workspace_id, &from).await?;

        if !self.dedup.mark_seen(workspace_id, provider_message_id).await? {
            tracing::debug!(provider_message_id, "duplicate inbound message, dropping");
            return Ok(());
        }

        let contact = workspace_queries::upsert_contact(&self.pool, workspace_id, &from).await?;
        let conversation = conv_queries::get_or_open_conversation(&self.pool, workspace_id, channel.id, contact.id).await?;

        conv_queries::insert_message(
            &self.pool,
            workspace_id,
            conversation.id,
            MessageRole::User,
            MessageDirection::Inbound,
            Some(provider_message_id),
            body,
            serde_json::json!({}),
        )
        .await?;

        let buffered = BufferedMessage {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            text: body.to_string(),
            provider_message_id: provider_message_id.to_string(),
        };
        let window_ttl_seconds = (self.debounce_cfg.window_ms / 1000).max(1) + 5;
        let buffer = self.debounce.push(workspace_id, &from, buffered, self.debounce_cfg.max_buffer, window_ttl_seconds).await?;

        if buffer.len() >= 2 {
            self.cancel_pending_flush(workspace_id, &from);
            self.flush_and_process(workspace_id, channel.id, contact.id, contact.phone.clone(), channel.display_phone.clone(), conversation.id)
                .await?;
        } else {
            self.schedule_delayed_flush(workspace_id, channel.id, contact.id, contact.phone.clone(), channel.display_phone.clone(), conversation.id);
        }

        Ok(())
    }

    async fn check_rate_limits(&self, workspace_id: Uuid, contact_phone: &str) -> Result<()> {
        let contact_key = format!("ratelimit:contact:{workspace_id}:{contact_phone}");
        let workspace_key = format!("ratelimit:workspace:{workspace_id}");

        let contact_count = self.ratelimiter.incr_minute_bucket(&contact_key).await?;
        if contact_count > self.ratelimit_cfg.per_contact_per_min as u64 {
            return Err(Error::RateLimited { retry_after_ms: 60_000 });
        }

        let workspace_count = self.ratelimiter.incr_minute_bucket(&workspace_key).await?;
        if workspace_count > (10 * self.ratelimit_cfg.per_contact_per_min) as u64 {
            return Err(Error::RateLimited { retry_after_ms: 60_000 });
        }

        Ok(())
    }

    fn cancel_pending_flush(&self, workspace_id: Uuid, contact_phone: &str) {
        if let Some((_, handle)) = self.pending_flushes.remove(&(workspace_id, contact_phone.to_string())) {
            handle.abort();
        }
    }

    fn schedule_delayed_flush(
        self: &Arc<Self>,
        workspace_id: Uuid,
        channel_id: Uuid,
        contact_id: Uuid,
        contact_phone: String,
        channel_display_phone: String,
        conversation_id: Uuid,
    ) {
        let router = Arc::clone(self);
        let delay = std::time::Duration::from_millis(self.debounce_cfg.window_ms);
        let key = (workspace_id, contact_phone.clone());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(error) =
                router.flush_and_process(workspace_id, channel_id, contact_id, contact_phone.clone(), channel_display_phone, conversation_id).await
            {
                tracing::error!(%error, "delayed debounce flush failed");
            }
            router.pending_flushes.remove(&(workspace_id, contact_phone));
        });
        self.pending_flushes.insert(key, handle);
    }

    /// Drains the debounce buffer (a no-op if it was already drained by a
    /// racing flush), synthesizes the combined turn, runs the orchestrator,
    /// persists the result, and sends the reply.
    async fn flush_and_process(
        &self,
        workspace_id: Uuid,
        _channel_id: Uuid,
        _contact_id: Uuid,
        contact_phone: String,
        channel_display_phone: String,
        conversation_id: Uuid,
    ) -> Result<()> {
        let drained = self.debounce.drain(workspace_id, &contact_phone).await?;
        if drained.is_empty() {
            return Ok(());
        }

        let combined_text = drained.iter().map(|m| m.text.as_str()).collect::<Vec<_>>().join(" ");
        let source_ids: Vec<String> = drained.iter().map(|m| m.provider_message_id.clone()).collect();
        let synthetic_id = Message::synthetic_provider_id(&source_ids);

        conv_queries::insert_message(
            &self.pool,
            workspace_id,
            conversation_id,
            MessageRole::User,
            MessageDirection::Inbound,
            Some(&synthetic_id),
            &combined_text,
            serde_json::json!({ "source_message_ids": source_ids }),
        )
        .await?;

        let workspace = workspace_queries::get_workspace(&self.pool, workspace_id).await?;
        let mut conn = self.pool.acquire().await?;
        let existing_slots = conv_queries::get_slots(&mut conn, workspace_id, conversation_id).await?;
        drop(conn);

        let slots: HashMap<String, SlotValue> =
            existing_slots.as_ref().and_then(|row| serde_json::from_value(row.slots.clone()).ok()).unwrap_or_default();

        let snapshot = ConversationSnapshot {
            conversation_id,
            workspace_id,
            vertical: workspace.vertical,
            user_input: combined_text,
            greeted: existing_slots.as_ref().map(|row| row.greeted).unwrap_or(false),
            slots,
            objective: existing_slots.as_ref().and_then(|row| row.objective.clone()),
            last_action: existing_slots.as_ref().and_then(|row| row.last_action.clone()),
            attempts_count: existing_slots.as_ref().map(|row| row.attempts_count).unwrap_or(0),
        };

        let greeted_before = snapshot.greeted;
        let response = self.orchestrator.decide(snapshot).await?;

        conv_queries::insert_message(
            &self.pool,
            workspace_id,
            conversation_id,
            MessageRole::Assistant,
            MessageDirection::Outbound,
            None,
            &response.assistant_text,
            serde_json::json!({ "next_action": response.next_action }),
        )
        .await?;

        let last_action = response
            .tool_calls
            .iter()
            .find_map(|call| match call {
                crate::orchestrator::ToolCall::ExecuteAction { action_name, .. } => Some(action_name.clone()),
                _ => None,
            })
            .or_else(|| existing_slots.as_ref().and_then(|row| row.last_action.clone()));

        conv_queries::upsert_slots(
            &self.pool,
            &ConversationSlots {
                conversation_id,
                workspace_id,
                slots: serde_json::to_value(&response.slots).unwrap_or_default(),
                objective: response.objective,
                greeted: greeted_before || matches!(response.next_action, crate::orchestrator::NextAction::Greet),
                attempts_count: response.attempts_count,
                last_action,
                updated_at: chrono::Utc::now(),
            },
        )
        .await?;

        self.whatsapp
            .send(&OutboundMessage { to: contact_phone, from: channel_display_phone, body: response.assistant_text })
            .await?;

        Ok(())
    }

    /// Cancels pending delayed-flush tasks for graceful shutdown (§5).
    pub fn shutdown(&self) {
        for entry in self.pending_flushes.iter() {
            entry.value().abort();
        }
        self.pending_flushes.clear();
    }
}
