use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Extract,
    Chunk,
    Embed,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Extract => "extract",
            JobType::Chunk => "chunk",
            JobType::Embed => "embed",
        }
    }

    pub fn next(&self) -> Option<JobType> {
        match self {
            JobType::Extract => Some(JobType::Chunk),
            JobType::Chunk => Some(JobType::Embed),
            JobType::Embed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Retry,
    Failed,
    Paused,
}

/// Queued unit of ingestion work (§3.1). Uniqueness of `(job_type,
/// external_key)` is invariant 6.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub document_id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub retries: i32,
    pub max_retries: i32,
    pub next_run_at: DateTime<Utc>,
    pub backoff_base_seconds: f64,
    pub backoff_factor: f64,
    pub jitter_seconds: f64,
    pub external_key: String,
    pub priority: i32,
    pub last_error: Option<String>,
    pub paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Terminal failures carried over from `ProcessingJob` for inspection/requeue.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessingJobDlq {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub document_id: Uuid,
    pub job_type: JobType,
    pub external_key: String,
    pub retries: i32,
    pub last_error: Option<String>,
    pub failed_at: DateTime<Utc>,
}
