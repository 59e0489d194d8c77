use crate::database::{DbConn, DbPool};
use crate::error::{Error, Result};
use crate::models::{Conversation, ConversationSlots, Message, MessageDirection, MessageRole};
use uuid::Uuid;

/// Finds the open conversation for this contact on this channel, or opens
/// a new one. Tenant-scoped by `workspace_id` on every predicate.
pub async fn get_or_open_conversation(
    pool: &DbPool,
    workspace_id: Uuid,
    channel_id: Uuid,
    contact_id: Uuid,
) -> Result<Conversation> {
    if let Some(existing) = sqlx::query_as!(
        Conversation,
        r#"
        SELECT id, workspace_id, channel_id, contact_id,
               status as "status: _",
               last_message_at, total_messages, last_message_text, last_message_sender
        FROM conversations
        WHERE workspace_id = $1 AND channel_id = $2 AND contact_id = $3 AND status = 'open'
        "#,
        workspace_id,
        channel_id,
        contact_id
    )
    .fetch_optional(pool)
    .await?
    {
        return Ok(existing);
    }

    sqlx::query_as!(
        Conversation,
        r#"
        INSERT INTO conversations
            (id, workspace_id, channel_id, contact_id, status, last_message_at, total_messages)
        VALUES (gen_random_uuid(), $1, $2, $3, 'open', now(), 0)
        RETURNING id, workspace_id, channel_id, contact_id,
                  status as "status: _",
                  last_message_at, total_messages, last_message_text, last_message_sender
        "#,
        workspace_id,
        channel_id,
        contact_id
    )
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

pub async fn insert_message(
    pool: &DbPool,
    workspace_id: Uuid,
    conversation_id: Uuid,
    role: MessageRole,
    direction: MessageDirection,
    provider_message_id: Option<&str>,
    content: &str,
    metadata: serde_json::Value,
) -> Result<Message> {
    let message = sqlx::query_as!(
        Message,
        r#"
        INSERT INTO messages
            (id, workspace_id, conversation_id, role, direction, message_type,
             provider_message_id, content, media_url, metadata, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, 'text', $5, $6, NULL, $7, now())
        RETURNING id, workspace_id, conversation_id,
                  role as "role: _", direction as "direction: _",
                  message_type, provider_message_id, content, media_url, metadata, created_at
        "#,
        workspace_id,
        conversation_id,
        role as MessageRole,
        direction as MessageDirection,
        provider_message_id,
        content,
        metadata
    )
    .fetch_one(pool)
    .await?;

    sqlx::query!(
        r#"
        UPDATE conversations
        SET total_messages = total_messages + 1,
            last_message_at = now(),
            last_message_text = $3,
            last_message_sender = $4
        WHERE workspace_id = $1 AND id = $2
        "#,
        workspace_id,
        conversation_id,
        content,
        role.to_string(),
    )
    .execute(pool)
    .await?;

    Ok(message)
}

pub async fn get_slots(
    conn: &mut DbConn,
    workspace_id: Uuid,
    conversation_id: Uuid,
) -> Result<Option<ConversationSlots>> {
    sqlx::query_as!(
        ConversationSlots,
        r#"
        SELECT conversation_id, workspace_id, slots, objective, greeted,
               attempts_count, last_action, updated_at
        FROM conversation_slots
        WHERE workspace_id = $1 AND conversation_id = $2
        "#,
        workspace_id,
        conversation_id
    )
    .fetch_optional(&mut *conn)
    .await
    .map_err(Error::from)
}

/// Upserts the single latest slots row for a conversation (invariant 3).
pub async fn upsert_slots(
    pool: &DbPool,
    slots: &ConversationSlots,
) -> Result<()> {
    sqlx::query!(
        r#"
        INSERT INTO conversation_slots
            (conversation_id, workspace_id, slots, objective, greeted, attempts_count, last_action, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        ON CONFLICT (conversation_id) DO UPDATE SET
            slots = EXCLUDED.slots,
            objective = EXCLUDED.objective,
            greeted = EXCLUDED.greeted,
            attempts_count = EXCLUDED.attempts_count,
            last_action = EXCLUDED.last_action,
            updated_at = now()
        "#,
        slots.conversation_id,
        slots.workspace_id,
        slots.slots,
        slots.objective,
        slots.greeted,
        slots.attempts_count,
        slots.last_action,
    )
    .execute(pool)
    .await?;
    Ok(())
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}
