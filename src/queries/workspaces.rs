use crate::database::DbPool;
use crate::error::{Error, Result};
use crate::models::{Channel, Contact, Workspace};
use uuid::Uuid;

pub async fn get_workspace(pool: &DbPool, workspace_id: Uuid) -> Result<Workspace> {
    sqlx::query_as!(
        Workspace,
        r#"
        SELECT id, display_name, plan_tier,
               vertical as "vertical: _",
               settings, created_at, updated_at
        FROM workspaces WHERE id = $1
        "#,
        workspace_id
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("workspace {workspace_id} not found")))
}

/// Resolves `(workspace, channel)` from the channel's display phone, as
/// used by webhook ingress to map an inbound `To` number (§4.8).
pub async fn get_channel_by_display_phone(pool: &DbPool, display_phone: &str) -> Result<Channel> {
    sqlx::query_as!(
        Channel,
        r#"SELECT id, workspace_id, display_phone, status FROM channels WHERE display_phone = $1 AND status = 'active'"#,
        display_phone
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("no active channel for {display_phone}")))
}

pub async fn upsert_contact(
    pool: &DbPool,
    workspace_id: Uuid,
    phone: &str,
) -> Result<Contact> {
    sqlx::query_as!(
        Contact,
        r#"
        INSERT INTO contacts (id, workspace_id, phone, created_at)
        VALUES (gen_random_uuid(), $1, $2, now())
        ON CONFLICT (workspace_id, phone) DO UPDATE SET phone = EXCLUDED.phone
        RETURNING id, workspace_id, phone, display_name, created_at
        "#,
        workspace_id,
        phone
    )
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}
