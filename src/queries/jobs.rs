use crate::database::DbConn;
use crate::error::{Error, Result};
use crate::models::{JobStatus, JobType, ProcessingJob, ProcessingJobDlq};
use uuid::Uuid;

/// Enqueues a job, a no-op if `(job_type, external_key)` already exists
/// (invariant 6, §4.4 step chaining).
#[allow(clippy::too_many_arguments)]
pub async fn enqueue(
    conn: &mut DbConn,
    workspace_id: Uuid,
    document_id: Uuid,
    job_type: JobType,
    external_key: &str,
    priority: i32,
    max_retries: i32,
    backoff_base_seconds: f64,
    backoff_factor: f64,
    jitter_seconds: f64,
) -> Result<()> {
    sqlx::query!(
        r#"
        INSERT INTO processing_jobs
            (id, workspace_id, document_id, job_type, status, retries, max_retries,
             next_run_at, backoff_base_seconds, backoff_factor, jitter_seconds,
             external_key, priority, paused, created_at, updated_at)
        VALUES (gen_random_uuid(), $1, $2, $3, 'pending', 0, $4, now(), $5, $6, $7, $8, $9, false, now(), now())
        ON CONFLICT (job_type, external_key) DO NOTHING
        "#,
        workspace_id,
        document_id,
        job_type as JobType,
        max_retries,
        backoff_base_seconds,
        backoff_factor,
        jitter_seconds,
        external_key,
        priority,
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Atomically claims up to `limit` jobs of `job_type` that are due and not
/// paused, locking rows so multiple dispatchers don't double-claim (§4.5).
pub async fn claim_batch(
    conn: &mut DbConn,
    job_type: JobType,
    limit: i64,
) -> Result<Vec<ProcessingJob>> {
    sqlx::query_as!(
        ProcessingJob,
        r#"
        UPDATE processing_jobs SET status = 'processing', updated_at = now()
        WHERE id IN (
            SELECT id FROM processing_jobs
            WHERE job_type = $1 AND status IN ('pending', 'retry') AND paused = false AND next_run_at <= now()
            ORDER BY priority DESC, next_run_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, workspace_id, document_id, job_type as "job_type: _", status as "status: _",
                  retries, max_retries, next_run_at, backoff_base_seconds, backoff_factor,
                  jitter_seconds, external_key, priority, last_error, paused, created_at, updated_at
        "#,
        job_type as JobType,
        limit
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(Error::from)
}

pub async fn mark_completed(conn: &mut DbConn, job_id: Uuid) -> Result<()> {
    sqlx::query!(
        r#"UPDATE processing_jobs SET status = 'completed', updated_at = now() WHERE id = $1"#,
        job_id
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Backoff on failure (§4.5): `next_run_at = now + base*factor^retries +
/// uniform(0, jitter)`. When `retries >= max_retries`, moves to `failed` and
/// mirrors into the DLQ.
pub async fn mark_failed_or_retry(
    conn: &mut DbConn,
    job: &ProcessingJob,
    error: &str,
    jitter_draw: f64,
) -> Result<JobStatus> {
    let retries = job.retries + 1;
    if retries >= job.max_retries {
        sqlx::query!(
            r#"UPDATE processing_jobs SET status = 'failed', retries = $2, last_error = $3, updated_at = now() WHERE id = $1"#,
            job.id,
            retries,
            error
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query!(
            r#"
            INSERT INTO processing_job_dlq (id, workspace_id, document_id, job_type, external_key, retries, last_error, failed_at)
            VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, now())
            "#,
            job.workspace_id,
            job.document_id,
            job.job_type as JobType,
            job.external_key,
            retries,
            error
        )
        .execute(&mut *conn)
        .await?;

        Ok(JobStatus::Failed)
    } else {
        let delay = job.backoff_base_seconds * job.backoff_factor.powi(retries)
            + jitter_draw * job.jitter_seconds;
        sqlx::query!(
            r#"
            UPDATE processing_jobs
            SET status = 'retry', retries = $2, last_error = $3,
                next_run_at = now() + make_interval(secs => $4), updated_at = now()
            WHERE id = $1
            "#,
            job.id,
            retries,
            error,
            delay
        )
        .execute(&mut *conn)
        .await?;
        Ok(JobStatus::Retry)
    }
}

pub async fn pause(conn: &mut DbConn, job_id: Uuid, paused: bool) -> Result<()> {
    sqlx::query!(
        r#"UPDATE processing_jobs SET paused = $2, updated_at = now() WHERE id = $1"#,
        job_id,
        paused
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_dlq(conn: &mut DbConn, job_type: Option<JobType>) -> Result<Vec<ProcessingJobDlq>> {
    sqlx::query_as!(
        ProcessingJobDlq,
        r#"
        SELECT id, workspace_id, document_id, job_type as "job_type: _", external_key, retries, last_error, failed_at
        FROM processing_job_dlq
        WHERE $1::text IS NULL OR job_type = $1::text
        ORDER BY failed_at DESC
        "#,
        job_type.map(|t| t.as_str().to_string())
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(Error::from)
}

/// Requeues everything in the DLQ of a given type, resetting retries.
pub async fn requeue_dlq_by_type(conn: &mut DbConn, job_type: JobType) -> Result<u64> {
    let result = sqlx::query!(
        r#"
        UPDATE processing_jobs SET status = 'pending', retries = 0, next_run_at = now(), updated_at = now()
        WHERE job_type = $1 AND status = 'failed'
        "#,
        job_type as JobType
    )
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn requeue_one(conn: &mut DbConn, job_id: Uuid) -> Result<()> {
    sqlx::query!(
        r#"UPDATE processing_jobs SET status = 'pending', retries = 0, next_run_at = now(), updated_at = now() WHERE id = $1"#,
        job_id
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn stats(conn: &mut DbConn) -> Result<Vec<(JobType, JobStatus, i64)>> {
    let rows = sqlx::query!(
        r#"
        SELECT job_type as "job_type: JobType", status as "status: JobStatus", count(*) as "count!"
        FROM processing_jobs GROUP BY job_type, status
        "#
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|r| (r.job_type, r.status, r.count)).collect())
}

pub async fn next_n(conn: &mut DbConn, limit: i64) -> Result<Vec<ProcessingJob>> {
    sqlx::query_as!(
        ProcessingJob,
        r#"
        SELECT id, workspace_id, document_id, job_type as "job_type: _", status as "status: _",
               retries, max_retries, next_run_at, backoff_base_seconds, backoff_factor,
               jitter_seconds, external_key, priority, last_error, paused, created_at, updated_at
        FROM processing_jobs
        WHERE status IN ('pending', 'retry') AND paused = false
        ORDER BY next_run_at LIMIT $1
        "#,
        limit
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(Error::from)
}
