//! Admin surface (C11, §4.9, §6.6): job/DLQ management, OCR overrides, and
//! the purge-deleted override. Every route here sits behind
//! `admin_auth_middleware`.

use crate::error::{Error, Result, ValidationErrors};
use crate::models::{JobStatus, JobType, ProcessingJob, ProcessingJobDlq};
use crate::state::AppState;
use crate::workers::purge;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

fn parse_job_type(raw: &str) -> Result<JobType> {
    match raw {
        "extract" => Ok(JobType::Extract),
        "chunk" => Ok(JobType::Chunk),
        "embed" => Ok(JobType::Embed),
        other => Err(Error::Validation(ValidationErrors::Single { field: "job_type".to_string(), message: format!("unknown job type {other}") })),
    }
}

#[derive(Debug, Deserialize)]
pub struct JobTypeQuery {
    pub job_type: String,
}

#[derive(Debug, Serialize)]
pub struct RequeueResponse {
    pub requeued: u64,
}

pub async fn requeue_dlq(State(state): State<AppState>, Query(q): Query<JobTypeQuery>) -> Result<Json<RequeueResponse>> {
    let requeued = state.jobs.requeue_dlq(parse_job_type(&q.job_type)?).await?;
    Ok(Json(RequeueResponse { requeued }))
}

#[derive(Debug, Deserialize)]
pub struct JobIdQuery {
    pub job_id: Uuid,
}

pub async fn requeue_one(State(state): State<AppState>, Query(q): Query<JobIdQuery>) -> Result<StatusCode> {
    state.jobs.requeue_one(q.job_id).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct PauseQuery {
    pub job_id: Uuid,
    pub pause: bool,
}

pub async fn pause(State(state): State<AppState>, Query(q): Query<PauseQuery>) -> Result<StatusCode> {
    state.jobs.pause(q.job_id, q.pause).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub struct OptionalJobTypeQuery {
    pub job_type: Option<String>,
}

pub async fn dlq(State(state): State<AppState>, Query(q): Query<OptionalJobTypeQuery>) -> Result<Json<Vec<ProcessingJobDlq>>> {
    let job_type = q.job_type.as_deref().map(parse_job_type).transpose()?;
    Ok(Json(state.jobs.dlq(job_type).await?))
}

#[derive(Debug, Serialize)]
pub struct JobStatsEntry {
    pub job_type: &'static str,
    pub status: &'static str,
    pub count: i64,
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Vec<JobStatsEntry>>> {
    let rows = state.jobs.stats().await?;
    Ok(Json(rows.into_iter().map(|(job_type, status, count)| JobStatsEntry { job_type: job_type.as_str(), status: status_str(status), count }).collect()))
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Processing => "processing",
        JobStatus::Completed => "completed",
        JobStatus::Retry => "retry",
        JobStatus::Failed => "failed",
        JobStatus::Paused => "paused",
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: i64,
}

pub async fn next(State(state): State<AppState>, Query(q): Query<LimitQuery>) -> Result<Json<Vec<ProcessingJob>>> {
    Ok(Json(state.jobs.next_n(q.limit.clamp(1, 200)).await?))
}

#[derive(Debug, Serialize)]
pub struct OcrRunOnceResponse {
    pub jobs_run: usize,
}

pub async fn ocr_run_once(State(state): State<AppState>) -> Result<Json<OcrRunOnceResponse>> {
    let jobs_run = state.jobs.run_ocr_once().await?;
    Ok(Json(OcrRunOnceResponse { jobs_run }))
}

#[derive(Debug, Deserialize)]
pub struct OcrEnableQuery {
    pub document_id: Uuid,
}

pub async fn ocr_enable(State(state): State<AppState>, Query(q): Query<OcrEnableQuery>) -> Result<StatusCode> {
    state.jobs.force_ocr(q.document_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn ocr_stats(State(state): State<AppState>) -> Json<HashMap<&'static str, u64>> {
    Json(state.jobs.ocr_stats())
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub retention_days: i64,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub purged: u64,
}

pub async fn purge_deleted(State(state): State<AppState>, Query(q): Query<PurgeQuery>) -> Result<Json<PurgeResponse>> {
    let purged = purge::purge_older_than(&state.pool, &state.storage, q.retention_days).await?;
    Ok(Json(PurgeResponse { purged }))
}
