//! Ingestion Pipeline (C5): upload → extract → chunk → embed, chained via
//! `processing_jobs.external_key` (§4.4). Each step is idempotent so a
//! retried job never duplicates work.

pub mod chunking;
pub mod embedding;
pub mod extraction;
pub mod storage;

pub use storage::ContentAddressedStore;

use crate::config::IngestionConfig;
use crate::database::DbPool;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::models::{JobType, ProcessingJob};
use crate::providers::{EmbeddingProvider, OcrProvider};
use crate::queries::{chunks as chunk_queries, files as file_queries, jobs as job_queries};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct IngestionPipeline {
    pool: DbPool,
    storage: ContentAddressedStore,
    ocr: Arc<dyn OcrProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: IngestionConfig,
    metrics: Arc<Metrics>,
}

impl IngestionPipeline {
    pub fn new(
        pool: DbPool,
        storage: ContentAddressedStore,
        ocr: Arc<dyn OcrProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: IngestionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { pool, storage, ocr, embedder, config, metrics }
    }

    /// Validates, hashes, stores, and dedup-inserts an upload, enqueuing the
    /// first pipeline step if the content is new (§4.4 Upload).
    pub async fn ingest_upload(
        &self,
        workspace_id: Uuid,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<Uuid> {
        crate::validation::validate_upload_mime(mime_type)?;
        if bytes.len() > self.config.max_upload_bytes {
            return Err(crate::error::Error::PayloadTooLarge(bytes.len()));
        }

        let (storage_uri, sha256) = self.storage.write(workspace_id, bytes).await?;
        let (file, was_duplicate) = file_queries::insert_or_get_existing(
            &self.pool,
            workspace_id,
            &storage_uri,
            filename,
            mime_type,
            &sha256,
            bytes.len() as i64,
        )
        .await?;

        self.metrics.ingestion_files_uploaded_total.with_label_values(&[&workspace_id.to_string()]).inc();

        if was_duplicate {
            tracing::info!(file_id = %file.id, "upload deduplicated by sha256, skipping re-ingestion");
            return Ok(file.id);
        }

        let document = file_queries::get_or_create_document(&self.pool, workspace_id, file.id, filename).await?;
        self.enqueue_step(workspace_id, document.id, JobType::Extract, 1).await?;
        Ok(file.id)
    }

    pub fn ingestion_max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Re-enqueues a file's pipeline from the extract step after a file-level
    /// retry backoff has elapsed (§4.4). Restarting from extract rather than
    /// the step that failed keeps the retry path simple and correct: a fresh
    /// extract produces a new revision that chunk/embed chain off normally.
    pub async fn retry_from_extract(&self, workspace_id: Uuid, document_id: Uuid) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let revision = file_queries::latest_revision(&mut conn, document_id).await?;
        drop(conn);
        let next_revision = revision.map(|r| r.revision + 1).unwrap_or(1);
        self.enqueue_step(workspace_id, document_id, JobType::Extract, next_revision).await
    }

    async fn enqueue_step(&self, workspace_id: Uuid, document_id: Uuid, step: JobType, revision: i32) -> Result<()> {
        let external_key = format!("{document_id}:{}:rev{revision}", step.as_str());
        let priority = match step {
            JobType::Extract => 100,
            JobType::Chunk => 60,
            JobType::Embed => 20,
        };
        let mut conn = self.pool.acquire().await?;
        job_queries::enqueue(
            &mut conn,
            workspace_id,
            document_id,
            step,
            &external_key,
            priority,
            self.config.max_attempts as i32,
            5.0,
            3.0,
            10.0,
        )
        .await
    }

    /// Reads the file from storage, extracts text (with OCR fallback),
    /// writes a new revision, and chains to the chunk step.
    pub async fn run_extract(&self, job: &ProcessingJob) -> Result<()> {
        let document = file_queries::get_document(&self.pool, job.document_id).await?;
        let file = file_queries::get_file(&self.pool, job.workspace_id, document.file_id).await?;
        self.run_extract_for(&document, &file, self.config.ocr_min_text_threshold).await
    }

    async fn run_extract_for(&self, document: &crate::models::Document, file: &crate::models::File, ocr_min_text_threshold: usize) -> Result<()> {
        let path = self.storage.resolve(&file.storage_uri);
        let (text, ocr_outcome) = extraction::extract(&path, &file.mime_type, &self.ocr, ocr_min_text_threshold).await?;
        if let Some(outcome) = ocr_outcome {
            self.metrics.ocr_attempts_total.with_label_values(&["attempted"]).inc();
            self.metrics.ocr_attempts_total.with_label_values(&[outcome]).inc();
        }
        let source = if ocr_outcome.is_some() { "ocr" } else { "extract" };

        let mut conn = self.pool.acquire().await?;
        let revision = file_queries::insert_revision(&mut conn, document.id, &text, serde_json::json!({ "source": source })).await?;
        drop(conn);

        self.enqueue_step(file.workspace_id, document.id, JobType::Chunk, revision.revision).await
    }

    /// Admin-triggered OCR re-extraction (§6.6 `POST /admin/ocr/enable`):
    /// forces the OCR branch regardless of the primary extraction's text
    /// length, for a document whose automatic threshold check was wrong.
    pub async fn force_ocr_reextract(&self, document_id: Uuid) -> Result<()> {
        let document = file_queries::get_document(&self.pool, document_id).await?;
        let file = file_queries::get_file(&self.pool, document.workspace_id, document.file_id).await?;
        self.run_extract_for(&document, &file, 0).await
    }

    /// Admin-triggered immediate pass (§6.6 `POST /admin/ocr/run-once`):
    /// claims and runs one batch of pending extract jobs right now, rather
    /// than waiting for the scheduler's next poll tick.
    pub async fn run_extract_batch_now(&self, limit: i64) -> Result<usize> {
        let mut conn = self.pool.acquire().await?;
        let jobs = job_queries::claim_batch(&mut conn, JobType::Extract, limit).await?;
        drop(conn);

        let mut ran = 0usize;
        for job in &jobs {
            let mut conn = self.pool.acquire().await?;
            match self.run_extract(job).await {
                Ok(()) => {
                    job_queries::mark_completed(&mut conn, job.id).await?;
                }
                Err(e) => {
                    job_queries::mark_failed_or_retry(&mut conn, job, &e.to_string(), rand::random()).await?;
                }
            }
            ran += 1;
        }
        Ok(ran)
    }

    /// Splits the latest revision into overlapping windows and upserts them
    /// as chunks, then chains to the embed step.
    pub async fn run_chunk(&self, job: &ProcessingJob) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let revision = file_queries::latest_revision(&mut conn, job.document_id)
            .await?
            .ok_or_else(|| crate::error::Error::NotFound(format!("no revision for document {}", job.document_id)))?;

        let (meta, _) = chunking::extract_meta_block(&revision.content);
        let plans = chunking::plan_chunks(&revision.content, self.config.chunk_window_size, self.config.chunk_overlap);

        for plan in &plans {
            chunk_queries::upsert_chunk(
                &mut conn,
                job.workspace_id,
                job.document_id,
                revision.revision,
                plan.position,
                &plan.text,
                meta.clone(),
            )
            .await?;
        }
        drop(conn);

        self.enqueue_step(job.workspace_id, job.document_id, JobType::Embed, revision.revision).await
    }

    /// Embeds every chunk of the latest revision missing a vector.
    pub async fn run_embed(&self, job: &ProcessingJob) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let revision = file_queries::latest_revision(&mut conn, job.document_id)
            .await?
            .ok_or_else(|| crate::error::Error::NotFound(format!("no revision for document {}", job.document_id)))?;
        drop(conn);

        let embedded = embedding::embed_missing_chunks(
            &self.pool,
            job.workspace_id,
            job.document_id,
            revision.revision,
            &self.embedder,
            self.config.embedding_concurrency(),
        )
        .await?;

        tracing::info!(document_id = %job.document_id, embedded, "embedding step completed");
        let document = file_queries::get_document(&self.pool, job.document_id).await?;
        file_queries::set_status(&self.pool, job.workspace_id, document.file_id, crate::models::FileStatus::Processed, None).await?;
        self.metrics.ingestion_files_processed_total.with_label_values(&[&job.workspace_id.to_string()]).inc();
        Ok(())
    }
}

impl IngestionConfig {
    fn embedding_concurrency(&self) -> usize {
        // Kept on IngestionConfig rather than SchedulerConfig: it bounds
        // fan-out *within* a single embed job, not how many embed jobs run
        // at once (that's `SchedulerConfig::embedding_concurrency`).
        4
    }
}
