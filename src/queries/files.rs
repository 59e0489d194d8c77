use crate::database::{DbConn, DbPool};
use crate::error::{Error, Result};
use crate::models::{Document, DocumentRevision, File, FileStatus};
use uuid::Uuid;

/// Insert-or-return-existing on `(workspace, sha256)` (invariant-adjacent
/// dedup contract, §4.4). Returns `(file, was_duplicate)`.
pub async fn insert_or_get_existing(
    pool: &DbPool,
    workspace_id: Uuid,
    storage_uri: &str,
    filename: &str,
    mime_type: &str,
    sha256: &str,
    bytes: i64,
) -> Result<(File, bool)> {
    if let Some(existing) = sqlx::query_as!(
        File,
        r#"
        SELECT id, workspace_id, storage_uri, filename, mime_type, sha256, bytes,
               status as "status: _", attempts, next_retry_at, last_error, deleted_at, purge_at, created_at
        FROM files WHERE workspace_id = $1 AND sha256 = $2 AND deleted_at IS NULL
        "#,
        workspace_id,
        sha256
    )
    .fetch_optional(pool)
    .await?
    {
        return Ok((existing, true));
    }

    let file = sqlx::query_as!(
        File,
        r#"
        INSERT INTO files
            (id, workspace_id, storage_uri, filename, mime_type, sha256, bytes, status, attempts, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, 'uploaded', 0, now())
        ON CONFLICT (workspace_id, sha256) WHERE deleted_at IS NULL DO UPDATE SET filename = EXCLUDED.filename
        RETURNING id, workspace_id, storage_uri, filename, mime_type, sha256, bytes,
                  status as "status: _", attempts, next_retry_at, last_error, deleted_at, purge_at, created_at
        "#,
        workspace_id,
        storage_uri,
        filename,
        mime_type,
        sha256,
        bytes
    )
    .fetch_one(pool)
    .await?;

    Ok((file, false))
}

pub async fn get_file(pool: &DbPool, workspace_id: Uuid, file_id: Uuid) -> Result<File> {
    sqlx::query_as!(
        File,
        r#"
        SELECT id, workspace_id, storage_uri, filename, mime_type, sha256, bytes,
               status as "status: _", attempts, next_retry_at, last_error, deleted_at, purge_at, created_at
        FROM files WHERE workspace_id = $1 AND id = $2
        "#,
        workspace_id,
        file_id
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("file {file_id} not found")))
}

pub async fn list_files(pool: &DbPool, workspace_id: Uuid) -> Result<Vec<File>> {
    sqlx::query_as!(
        File,
        r#"
        SELECT id, workspace_id, storage_uri, filename, mime_type, sha256, bytes,
               status as "status: _", attempts, next_retry_at, last_error, deleted_at, purge_at, created_at
        FROM files WHERE workspace_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC
        "#,
        workspace_id
    )
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

pub async fn set_status(
    pool: &DbPool,
    workspace_id: Uuid,
    file_id: Uuid,
    status: FileStatus,
    last_error: Option<&str>,
) -> Result<()> {
    sqlx::query!(
        r#"UPDATE files SET status = $3, last_error = $4 WHERE workspace_id = $1 AND id = $2"#,
        workspace_id,
        file_id,
        status as FileStatus,
        last_error
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// File-level retry policy (§4.4): `next_retry_at = now + 5*3^(attempts-1)` minutes.
pub async fn record_attempt_failure(
    pool: &DbPool,
    workspace_id: Uuid,
    file_id: Uuid,
    max_attempts: i32,
    error: &str,
) -> Result<bool> {
    let row = sqlx::query!(
        r#"UPDATE files SET attempts = attempts + 1, last_error = $3
           WHERE workspace_id = $1 AND id = $2
           RETURNING attempts"#,
        workspace_id,
        file_id,
        error
    )
    .fetch_one(pool)
    .await?;

    let exhausted = row.attempts >= max_attempts;
    if exhausted {
        set_status(pool, workspace_id, file_id, FileStatus::Failed, Some(error)).await?;
    } else {
        let delay_minutes = 5.0 * 3f64.powi(row.attempts - 1);
        sqlx::query!(
            r#"UPDATE files SET next_retry_at = now() + make_interval(mins => $3), status = 'processing'
               WHERE workspace_id = $1 AND id = $2"#,
            workspace_id,
            file_id,
            delay_minutes
        )
        .execute(pool)
        .await?;
    }
    Ok(exhausted)
}

pub async fn soft_delete_file(pool: &DbPool, workspace_id: Uuid, file_id: Uuid, purge_window_days: i64) -> Result<()> {
    sqlx::query!(
        r#"
        UPDATE files SET deleted_at = now(), purge_at = now() + make_interval(days => $3), status = 'deleted'
        WHERE workspace_id = $1 AND id = $2
        "#,
        workspace_id,
        file_id,
        purge_window_days as f64
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn restore_file(pool: &DbPool, workspace_id: Uuid, file_id: Uuid) -> Result<()> {
    sqlx::query!(
        r#"UPDATE files SET deleted_at = NULL, purge_at = NULL, status = 'processed'
           WHERE workspace_id = $1 AND id = $2"#,
        workspace_id,
        file_id
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Claims files past their purge deadline, cascading file -> documents ->
/// chunks -> embeddings (§4.4, §3.2 invariant 2). Called by the janitor.
pub async fn claim_purge_batch(conn: &mut DbConn, limit: i64) -> Result<Vec<Uuid>> {
    let rows = sqlx::query!(
        r#"
        SELECT id FROM files
        WHERE deleted_at IS NOT NULL AND purge_at <= now()
        ORDER BY purge_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
        limit
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|r| r.id).collect())
}

/// Fetches `(workspace_id, storage_uri)` for a file about to be purged, so
/// the janitor can delete the on-disk blob before the row disappears.
pub async fn storage_uri_for_file(conn: &mut DbConn, file_id: Uuid) -> Result<Option<(Uuid, String)>> {
    let row = sqlx::query!(r#"SELECT workspace_id, storage_uri FROM files WHERE id = $1"#, file_id).fetch_optional(&mut *conn).await?;
    Ok(row.map(|r| (r.workspace_id, r.storage_uri)))
}

/// Claims files whose file-level backoff has elapsed: `processing` with a
/// due `next_retry_at` means a job exhausted its own retries and kicked the
/// whole file back for another attempt (§4.4). Clears `next_retry_at` so a
/// re-enqueue in flight isn't claimed twice.
pub async fn claim_retry_batch(conn: &mut DbConn, limit: i64) -> Result<Vec<(Uuid, Uuid, Uuid)>> {
    let rows = sqlx::query!(
        r#"
        UPDATE files f SET next_retry_at = NULL
        FROM documents d
        WHERE f.id = d.file_id
          AND f.deleted_at IS NULL
          AND f.status = 'processing'
          AND f.next_retry_at IS NOT NULL
          AND f.next_retry_at <= now()
          AND f.id IN (
              SELECT id FROM files
              WHERE deleted_at IS NULL AND status = 'processing' AND next_retry_at <= now()
              ORDER BY next_retry_at
              LIMIT $1
              FOR UPDATE SKIP LOCKED
          )
        RETURNING f.id as file_id, f.workspace_id, d.id as document_id
        "#,
        limit
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|r| (r.file_id, r.workspace_id, r.document_id)).collect())
}

pub async fn purge_file_cascade(conn: &mut DbConn, file_id: Uuid) -> Result<()> {
    sqlx::query!(
        r#"DELETE FROM chunk_embeddings WHERE document_id IN (SELECT id FROM documents WHERE file_id = $1)"#,
        file_id
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query!(
        r#"DELETE FROM chunks WHERE document_id IN (SELECT id FROM documents WHERE file_id = $1)"#,
        file_id
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query!(r#"DELETE FROM document_revisions WHERE document_id IN (SELECT id FROM documents WHERE file_id = $1)"#, file_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query!(r#"DELETE FROM documents WHERE file_id = $1"#, file_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query!(r#"DELETE FROM files WHERE id = $1"#, file_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Looks a document up by its owning file, used by the reingest endpoint
/// (§6.4) which addresses a file, not a document.
pub async fn get_document_by_file(pool: &DbPool, workspace_id: Uuid, file_id: Uuid) -> Result<Document> {
    sqlx::query_as!(
        Document,
        r#"SELECT id, workspace_id, file_id, title, language, token_count, deleted_at FROM documents WHERE workspace_id = $1 AND file_id = $2"#,
        workspace_id,
        file_id
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("no document for file {file_id}")))
}

/// Admin override of the purge schedule (§6.6 `POST /admin/purge-deleted`):
/// claims soft-deleted files older than `retention_days`, ignoring their
/// individually scheduled `purge_at`.
pub async fn claim_purge_batch_older_than(conn: &mut DbConn, retention_days: i64, limit: i64) -> Result<Vec<Uuid>> {
    let rows = sqlx::query!(
        r#"
        SELECT id FROM files
        WHERE deleted_at IS NOT NULL AND deleted_at <= now() - make_interval(days => $1)
        ORDER BY deleted_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        "#,
        retention_days as f64,
        limit
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|r| r.id).collect())
}

pub async fn get_document(pool: &DbPool, document_id: Uuid) -> Result<Document> {
    sqlx::query_as!(
        Document,
        r#"SELECT id, workspace_id, file_id, title, language, token_count, deleted_at FROM documents WHERE id = $1"#,
        document_id
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("document {document_id} not found")))
}

pub async fn get_or_create_document(pool: &DbPool, workspace_id: Uuid, file_id: Uuid, title: &str) -> Result<Document> {
    sqlx::query_as!(
        Document,
        r#"
        INSERT INTO documents (id, workspace_id, file_id, title, deleted_at)
        VALUES (gen_random_uuid(), $1, $2, $3, NULL)
        ON CONFLICT (file_id) DO UPDATE SET title = EXCLUDED.title
        RETURNING id, workspace_id, file_id, title, language, token_count, deleted_at
        "#,
        workspace_id,
        file_id,
        title
    )
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

/// Monotonic revision insert: `revision = max(existing) + 1` (invariant 4).
pub async fn insert_revision(
    conn: &mut DbConn,
    document_id: Uuid,
    content: &str,
    metadata: serde_json::Value,
) -> Result<DocumentRevision> {
    sqlx::query_as!(
        DocumentRevision,
        r#"
        INSERT INTO document_revisions (document_id, revision, content, metadata, created_at)
        SELECT $1, COALESCE(MAX(revision), 0) + 1, $2, $3, now()
        FROM document_revisions WHERE document_id = $1
        RETURNING document_id, revision, content, metadata, created_at
        "#,
        document_id,
        content,
        metadata
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(Error::from)
}

pub async fn latest_revision(conn: &mut DbConn, document_id: Uuid) -> Result<Option<DocumentRevision>> {
    sqlx::query_as!(
        DocumentRevision,
        r#"
        SELECT document_id, revision, content, metadata, created_at
        FROM document_revisions WHERE document_id = $1 ORDER BY revision DESC LIMIT 1
        "#,
        document_id
    )
    .fetch_optional(&mut *conn)
    .await
    .map_err(Error::from)
}
