use crate::database::DbConn;
use crate::error::{Error, Result};
use crate::models::Chunk;
use uuid::Uuid;

/// Idempotent insert keyed by `(document_id, revision, position)`: a
/// restarted chunking step never duplicates chunks (§4.4 step chaining).
pub async fn upsert_chunk(
    conn: &mut DbConn,
    workspace_id: Uuid,
    document_id: Uuid,
    revision: i32,
    position: i32,
    text: &str,
    meta: serde_json::Value,
) -> Result<Chunk> {
    sqlx::query_as!(
        Chunk,
        r#"
        INSERT INTO chunks (id, workspace_id, document_id, revision, position, text, meta, deleted_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, NULL)
        ON CONFLICT (document_id, revision, position) DO UPDATE SET text = EXCLUDED.text, meta = EXCLUDED.meta
        RETURNING id, workspace_id, document_id, revision, position, text, meta, deleted_at
        "#,
        workspace_id,
        document_id,
        revision,
        position,
        text,
        meta
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(Error::from)
}

pub async fn chunks_without_embedding(conn: &mut DbConn, document_id: Uuid, revision: i32) -> Result<Vec<Chunk>> {
    sqlx::query_as!(
        Chunk,
        r#"
        SELECT c.id, c.workspace_id, c.document_id, c.revision, c.position, c.text, c.meta, c.deleted_at
        FROM chunks c
        LEFT JOIN chunk_embeddings e ON e.chunk_id = c.id
        WHERE c.document_id = $1 AND c.revision = $2 AND e.chunk_id IS NULL AND c.deleted_at IS NULL
        ORDER BY c.position
        "#,
        document_id,
        revision
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(Error::from)
}

/// `ON CONFLICT DO NOTHING` so a restart never duplicates (§4.4 Embedding).
pub async fn insert_embedding_if_absent(
    conn: &mut DbConn,
    chunk_id: Uuid,
    workspace_id: Uuid,
    document_id: Uuid,
    vector: pgvector::Vector,
) -> Result<()> {
    sqlx::query!(
        r#"
        INSERT INTO chunk_embeddings (chunk_id, workspace_id, document_id, vector, deleted_at)
        VALUES ($1, $2, $3, $4, NULL)
        ON CONFLICT (chunk_id) DO NOTHING
        "#,
        chunk_id,
        workspace_id,
        document_id,
        vector as pgvector::Vector,
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}
