//! File upload and lifecycle endpoints (§6.4): upload, list, fetch, soft
//! delete, hard purge, and manual reingest.

use crate::error::{Error, Result, ValidationErrors};
use crate::middleware::WorkspaceId;
use crate::queries::files as file_queries;
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub status: &'static str,
    pub message: &'static str,
}

/// `POST /files`: multipart upload, deduped on `(workspace, sha256)` by the
/// ingestion pipeline itself.
pub async fn upload(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, mut multipart: Multipart) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut filename = None;
    let mut mime_type = None;
    let mut bytes = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::Validation(ValidationErrors::Single { field: "file".to_string(), message: e.to_string() }))? {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_string);
            mime_type = field.content_type().map(str::to_string);
            bytes = Some(field.bytes().await.map_err(|e| Error::Validation(ValidationErrors::Single { field: "file".to_string(), message: e.to_string() }))?);
        }
    }

    let filename = filename.ok_or_else(|| Error::Validation(ValidationErrors::Single { field: "file".to_string(), message: "missing file part".to_string() }))?;
    let mime_type = mime_type.unwrap_or_else(|| "application/octet-stream".to_string());
    let bytes = bytes.ok_or_else(|| Error::Validation(ValidationErrors::Single { field: "file".to_string(), message: "missing file part".to_string() }))?;

    let file_id = state.ingestion.ingest_upload(workspace_id, &filename, &mime_type, &bytes).await?;
    let file = file_queries::get_file(&state.pool, workspace_id, file_id).await?;

    let (status, message) = if file.attempts > 0 || file.status != crate::models::FileStatus::Uploaded {
        ("duplicate", "content already ingested")
    } else {
        ("uploaded", "queued for processing")
    };

    Ok((StatusCode::CREATED, Json(UploadResponse { file_id, filename, status, message })))
}

pub async fn list(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId) -> Result<Json<Vec<crate::models::File>>> {
    Ok(Json(file_queries::list_files(&state.pool, workspace_id).await?))
}

pub async fn get(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, Path(file_id): Path<Uuid>) -> Result<Json<crate::models::File>> {
    Ok(Json(file_queries::get_file(&state.pool, workspace_id, file_id).await?))
}

/// `DELETE /files/{id}`: soft delete, scheduling the on-disk blob and its
/// derived rows for the janitor to purge after the retention window.
pub async fn delete(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, Path(file_id): Path<Uuid>) -> Result<StatusCode> {
    file_queries::get_file(&state.pool, workspace_id, file_id).await?;
    file_queries::soft_delete_file(&state.pool, workspace_id, file_id, state.config.ingestion.purge_window_days).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /files/{id}/purge`: immediate hard delete, bypassing the
/// retention window. Intended for operator-initiated cleanup, not the
/// tenant-facing delete flow.
pub async fn purge(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, Path(file_id): Path<Uuid>) -> Result<StatusCode> {
    let file = file_queries::get_file(&state.pool, workspace_id, file_id).await?;
    let mut conn = state.pool.acquire().await?;
    file_queries::purge_file_cascade(&mut conn, file_id).await?;
    state.storage.delete(&file.storage_uri).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /files/{id}/reingest`: re-runs the pipeline from extraction,
/// typically after fixing an OCR or provider outage that had stalled it.
pub async fn reingest(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, Path(file_id): Path<Uuid>) -> Result<StatusCode> {
    let document = file_queries::get_document_by_file(&state.pool, workspace_id, file_id).await?;
    state.ingestion.retry_from_extract(workspace_id, document.id).await?;
    Ok(StatusCode::ACCEPTED)
}
