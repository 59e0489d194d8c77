//! Job Scheduler (C6): polls `processing_jobs`, dispatches by `job_type` to
//! the ingestion pipeline, enforces a per-workspace circuit breaker, and
//! exposes the admin operations used by `handlers::admin` (§4.5).

pub mod breaker;

use crate::config::SchedulerConfig;
use crate::database::DbPool;
use crate::error::Result;
use crate::ingestion::IngestionPipeline;
use crate::metrics::Metrics;
use crate::models::{JobStatus, JobType, ProcessingJob};
use crate::queries::jobs as job_queries;
use breaker::CircuitBreakerRegistry;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

#[derive(Clone)]
pub struct JobDispatcher {
    pool: DbPool,
    pipeline: IngestionPipeline,
    config: SchedulerConfig,
    breakers: Arc<CircuitBreakerRegistry>,
    metrics: Arc<Metrics>,
}

impl JobDispatcher {
    pub fn new(pool: DbPool, pipeline: IngestionPipeline, config: SchedulerConfig, metrics: Arc<Metrics>) -> Self {
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            config.embedding_cb_fails,
            Duration::from_secs(config.embedding_cb_window_seconds),
            Duration::from_secs(config.embedding_cb_cooldown_seconds),
        ));
        Self { pool, pipeline, config, breakers, metrics }
    }

    /// Runs forever, polling each job type on its own semaphore-bounded
    /// concurrency, until `shutdown` resolves.
    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.poll_interval_seconds));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!(error = %e, "scheduler poll failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn poll_once(&self) -> Result<()> {
        tokio::try_join!(
            self.poll_type(JobType::Extract, self.config.max_concurrency_extract),
            self.poll_type(JobType::Chunk, self.config.max_concurrency_chunk),
            self.poll_type(JobType::Embed, self.config.max_concurrency_embed),
        )?;
        Ok(())
    }

    async fn poll_type(&self, job_type: JobType, concurrency: usize) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let jobs = job_queries::claim_batch(&mut conn, job_type, concurrency as i64).await?;
        drop(conn);

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::new();
        for job in jobs {
            let permit = Arc::clone(&semaphore);
            let this = self.clone();
            this.metrics.scheduler_jobs_running.inc();
            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                this.execute(job).await;
                this.metrics.scheduler_jobs_running.dec();
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        Ok(())
    }

    async fn execute(&self, job: ProcessingJob) {
        if self.breakers.is_open(job.workspace_id) {
            tracing::warn!(workspace_id = %job.workspace_id, job_id = %job.id, "circuit open, deferring job as a retry");
            let mut conn = match self.pool.acquire().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "failed to acquire connection to defer job");
                    return;
                }
            };
            let jitter = rand::rng().random::<f64>();
            let _ = job_queries::mark_failed_or_retry(&mut conn, &job, "circuit breaker open", jitter).await;
            return;
        }

        let result = match job.job_type {
            JobType::Extract => self.pipeline.run_extract(&job).await,
            JobType::Chunk => self.pipeline.run_chunk(&job).await,
            JobType::Embed => self.pipeline.run_embed(&job).await,
        };

        let mut conn = match self.pool.acquire().await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "failed to acquire connection to finalize job");
                return;
            }
        };

        match result {
            Ok(()) => {
                self.breakers.record_success(job.workspace_id);
                let _ = job_queries::mark_completed(&mut conn, job.id).await;
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, job_type = job.job_type.as_str(), error = %e, "job failed");
                self.breakers.record_failure(job.workspace_id);
                self.metrics.scheduler_jobs_retried_total.with_label_values(&[job.job_type.as_str()]).inc();
                let jitter = rand::rng().random::<f64>();
                let status = job_queries::mark_failed_or_retry(&mut conn, &job, &e.to_string(), jitter).await;
                if let Ok(JobStatus::Failed) = status {
                    tracing::error!(job_id = %job.id, "job moved to dead-letter queue");
                    self.metrics.scheduler_jobs_dlq_total.with_label_values(&[job.job_type.as_str()]).inc();
                    // A job that exhausted its own retries kicks the file
                    // back for a coarser, file-level retry (§4.4): the job
                    // queue's backoff covers transient step failures, this
                    // covers the file needing a whole fresh pass.
                    if let Ok(document) = crate::queries::files::get_document(&self.pool, job.document_id).await {
                        let max_attempts = self.pipeline.ingestion_max_attempts() as i32;
                        match crate::queries::files::record_attempt_failure(&self.pool, job.workspace_id, document.file_id, max_attempts, &e.to_string()).await {
                            Ok(exhausted) if exhausted => {
                                self.metrics.ingestion_files_failed_total.with_label_values(&[&job.workspace_id.to_string()]).inc();
                            }
                            Ok(_) => {}
                            Err(err) => tracing::error!(error = %err, file_id = %document.file_id, "failed to record file-level attempt"),
                        }
                    }
                }
            }
        }
    }

    pub async fn pause(&self, job_id: uuid::Uuid, paused: bool) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        job_queries::pause(&mut conn, job_id, paused).await
    }

    pub async fn requeue_one(&self, job_id: uuid::Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        job_queries::requeue_one(&mut conn, job_id).await
    }

    pub async fn requeue_dlq(&self, job_type: JobType) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        job_queries::requeue_dlq_by_type(&mut conn, job_type).await
    }

    pub async fn dlq(&self, job_type: Option<JobType>) -> Result<Vec<crate::models::ProcessingJobDlq>> {
        let mut conn = self.pool.acquire().await?;
        job_queries::list_dlq(&mut conn, job_type).await
    }

    pub async fn stats(&self) -> Result<Vec<(JobType, JobStatus, i64)>> {
        let mut conn = self.pool.acquire().await?;
        job_queries::stats(&mut conn).await
    }

    pub async fn next_n(&self, limit: i64) -> Result<Vec<ProcessingJob>> {
        let mut conn = self.pool.acquire().await?;
        job_queries::next_n(&mut conn, limit).await
    }

    /// `POST /admin/ocr/run-once`: runs one extract batch immediately instead
    /// of waiting for the next poll tick.
    pub async fn run_ocr_once(&self) -> Result<usize> {
        self.pipeline.run_extract_batch_now(self.config.max_concurrency_extract as i64).await
    }

    /// `POST /admin/ocr/enable?document_id=`: forces OCR re-extraction for a
    /// single document, overriding the text-length threshold.
    pub async fn force_ocr(&self, document_id: uuid::Uuid) -> Result<()> {
        self.pipeline.force_ocr_reextract(document_id).await
    }

    pub fn ocr_stats(&self) -> std::collections::HashMap<&'static str, u64> {
        self.metrics.ocr_stats()
    }
}
