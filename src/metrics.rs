//! Observability (C10, §4.9): request/latency counters per component,
//! exposed as a Prometheus text page at `GET /metrics`.

use prometheus::{
    exponential_buckets, Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub scheduler_jobs_running: IntGauge,
    pub scheduler_jobs_retried_total: IntCounterVec,
    pub scheduler_jobs_dlq_total: IntCounterVec,
    pub scheduler_job_duration_seconds: HistogramVec,
    pub ingestion_files_uploaded_total: IntCounterVec,
    pub ingestion_files_processed_total: IntCounterVec,
    pub ingestion_files_failed_total: IntCounterVec,
    pub ocr_attempts_total: IntCounterVec,
    pub retrieval_requests_total: IntCounterVec,
    pub retrieval_errors_total: IntCounterVec,
    pub retrieval_latency_seconds: HistogramVec,
    pub embedding_cache_hits_total: IntCounterVec,
    pub embedding_cache_misses_total: IntCounterVec,
    pub actions_requests_total: IntCounterVec,
    pub actions_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounterVec::new(prometheus::Opts::new("http_requests_total", "HTTP requests by route and status"), &["route", "status"])?;
        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("http_request_duration_seconds", "HTTP request latency by route")
                .buckets(exponential_buckets(0.005, 2.0, 12)?),
            &["route"],
        )?;
        let scheduler_jobs_running = IntGauge::new("scheduler_jobs_running", "Jobs currently executing across all types")?;
        let scheduler_jobs_retried_total =
            IntCounterVec::new(prometheus::Opts::new("scheduler_jobs_retried_total", "Jobs moved to retry by type"), &["job_type"])?;
        let scheduler_jobs_dlq_total =
            IntCounterVec::new(prometheus::Opts::new("scheduler_jobs_dlq_total", "Jobs moved to the dead-letter queue by type"), &["job_type"])?;
        let scheduler_job_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("scheduler_job_duration_seconds", "Job execution latency by type")
                .buckets(exponential_buckets(0.05, 2.0, 12)?),
            &["job_type"],
        )?;
        let ingestion_files_uploaded_total =
            IntCounterVec::new(prometheus::Opts::new("ingestion_files_uploaded_total", "Uploads accepted by workspace"), &["workspace_id"])?;
        let ingestion_files_processed_total = IntCounterVec::new(
            prometheus::Opts::new("ingestion_files_processed_total", "Files that reached the processed status"),
            &["workspace_id"],
        )?;
        let ingestion_files_failed_total =
            IntCounterVec::new(prometheus::Opts::new("ingestion_files_failed_total", "Files that exhausted retries into failed"), &["workspace_id"])?;
        let ocr_attempts_total = IntCounterVec::new(prometheus::Opts::new("ocr_attempts_total", "OCR fallback invocations by outcome"), &["outcome"])?;
        let retrieval_requests_total =
            IntCounterVec::new(prometheus::Opts::new("retrieval_requests_total", "Retrieval requests by endpoint"), &["endpoint"])?;
        let retrieval_errors_total =
            IntCounterVec::new(prometheus::Opts::new("retrieval_errors_total", "Retrieval failures by endpoint"), &["endpoint"])?;
        let retrieval_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("retrieval_latency_seconds", "Retrieval latency by endpoint")
                .buckets(exponential_buckets(0.005, 2.0, 12)?),
            &["endpoint"],
        )?;
        let embedding_cache_hits_total = IntCounterVec::new(prometheus::Opts::new("embedding_cache_hits_total", "Query embedding cache hits"), &["workspace_id"])?;
        let embedding_cache_misses_total =
            IntCounterVec::new(prometheus::Opts::new("embedding_cache_misses_total", "Query embedding cache misses"), &["workspace_id"])?;
        let actions_requests_total =
            IntCounterVec::new(prometheus::Opts::new("actions_requests_total", "Action executions by name and outcome"), &["action_name", "outcome"])?;
        let actions_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new("actions_duration_seconds", "Action execution latency by name")
                .buckets(exponential_buckets(0.01, 2.0, 12)?),
            &["action_name"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(scheduler_jobs_running.clone()))?;
        registry.register(Box::new(scheduler_jobs_retried_total.clone()))?;
        registry.register(Box::new(scheduler_jobs_dlq_total.clone()))?;
        registry.register(Box::new(scheduler_job_duration_seconds.clone()))?;
        registry.register(Box::new(ingestion_files_uploaded_total.clone()))?;
        registry.register(Box::new(ingestion_files_processed_total.clone()))?;
        registry.register(Box::new(ingestion_files_failed_total.clone()))?;
        registry.register(Box::new(ocr_attempts_total.clone()))?;
        registry.register(Box::new(retrieval_requests_total.clone()))?;
        registry.register(Box::new(retrieval_errors_total.clone()))?;
        registry.register(Box::new(retrieval_latency_seconds.clone()))?;
        registry.register(Box::new(embedding_cache_hits_total.clone()))?;
        registry.register(Box::new(embedding_cache_misses_total.clone()))?;
        registry.register(Box::new(actions_requests_total.clone()))?;
        registry.register(Box::new(actions_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            scheduler_jobs_running,
            scheduler_jobs_retried_total,
            scheduler_jobs_dlq_total,
            scheduler_job_duration_seconds,
            ingestion_files_uploaded_total,
            ingestion_files_processed_total,
            ingestion_files_failed_total,
            ocr_attempts_total,
            retrieval_requests_total,
            retrieval_errors_total,
            retrieval_latency_seconds,
            embedding_cache_hits_total,
            embedding_cache_misses_total,
            actions_requests_total,
            actions_duration_seconds,
        })
    }

    /// Snapshot of OCR fallback outcomes for `GET /admin/ocr/stats`.
    pub fn ocr_stats(&self) -> std::collections::HashMap<&'static str, u64> {
        ["attempted", "success", "fail"]
            .into_iter()
            .map(|outcome| (outcome, self.ocr_attempts_total.with_label_values(&[outcome]).get()))
            .collect()
    }

    /// Renders the registry in Prometheus exposition format (§6.7).
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(error) = encoder.encode(&families, &mut buffer) {
            tracing::error!(%error, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
