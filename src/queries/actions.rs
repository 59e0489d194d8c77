use crate::database::DbConn;
use crate::error::Result;
use crate::models::{ActionExecution, ActionStatus};
use uuid::Uuid;

/// Insert-or-claim on `(workspace, idempotency_key)` (§4.6 step 2,
/// invariant 5). Returns `(execution, was_preexisting)`.
pub async fn insert_or_claim(
    conn: &mut DbConn,
    workspace_id: Uuid,
    conversation_id: Uuid,
    action_name: &str,
    idempotency_key: &str,
    fingerprint: &str,
) -> Result<(ActionExecution, bool)> {
    let existing = sqlx::query_as!(
        ActionExecution,
        r#"
        SELECT id, workspace_id, conversation_id, action_name, idempotency_key,
               status as "status: _", summary, details, created_at, completed_at
        FROM action_executions WHERE workspace_id = $1 AND idempotency_key = $2
        "#,
        workspace_id,
        idempotency_key
    )
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(existing) = existing {
        if existing.details.get("fingerprint").and_then(|v| v.as_str()) != Some(fingerprint) {
            tracing::warn!(
                idempotency_key,
                "idempotency key reused with a different payload fingerprint"
            );
        }
        return Ok((existing, true));
    }

    let details = serde_json::json!({ "fingerprint": fingerprint });
    let created = sqlx::query_as!(
        ActionExecution,
        r#"
        INSERT INTO action_executions
            (id, workspace_id, conversation_id, action_name, idempotency_key, status, details, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, 'processing', $5, now())
        ON CONFLICT (workspace_id, idempotency_key) DO NOTHING
        RETURNING id, workspace_id, conversation_id, action_name, idempotency_key,
                  status as "status: _", summary, details, created_at, completed_at
        "#,
        workspace_id,
        conversation_id,
        action_name,
        idempotency_key,
        details
    )
    .fetch_optional(&mut *conn)
    .await?;

    match created {
        Some(execution) => Ok((execution, false)),
        // Lost the insert race to a concurrent caller; fetch what they wrote.
        None => {
            let row = sqlx::query_as!(
                ActionExecution,
                r#"
                SELECT id, workspace_id, conversation_id, action_name, idempotency_key,
                       status as "status: _", summary, details, created_at, completed_at
                FROM action_executions WHERE workspace_id = $1 AND idempotency_key = $2
                "#,
                workspace_id,
                idempotency_key
            )
            .fetch_one(&mut *conn)
            .await?;
            Ok((row, true))
        }
    }
}

pub async fn finalize(
    conn: &mut DbConn,
    execution_id: Uuid,
    status: ActionStatus,
    summary: Option<&str>,
    details: serde_json::Value,
) -> Result<()> {
    sqlx::query!(
        r#"
        UPDATE action_executions
        SET status = $2, summary = $3, details = $4, completed_at = now()
        WHERE id = $1
        "#,
        execution_id,
        status as ActionStatus,
        summary,
        details
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn insert_outbox_event(
    conn: &mut DbConn,
    workspace_id: Uuid,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<()> {
    sqlx::query!(
        r#"
        INSERT INTO outbox_events (id, workspace_id, event_type, payload, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, now())
        "#,
        workspace_id,
        event_type,
        payload
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}
