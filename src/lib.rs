pub mod actions;
pub mod config;
pub mod crypto;
pub mod database;
pub mod ephemeral;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod queries;
pub mod retrieval;
pub mod router;
pub mod scheduler;
pub mod state;
pub mod utils;
pub mod validation;
pub mod workers;

pub use config::Config;
pub use database::{DbConn, DbPool};
pub use error::{Error, Result, ValidationErrors};
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Load configuration from environment variables.
pub fn load_config() -> Result<Config> {
    Config::load().map_err(|e| Error::Config(e.to_string()))
}

/// Initializes the tracing subscriber, reading `RUST_LOG` (defaulting to
/// `info`) the way every worker and handler in this crate expects.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .with_target(false)
        .init();
}

fn get_git_commit_hash() -> String {
    if let Ok(commit) = std::env::var("GIT_COMMIT") {
        if !commit.is_empty() {
            return commit;
        }
    }
    use std::process::Command;
    if let Ok(output) = Command::new("git").args(["rev-parse", "--short", "HEAD"]).output() {
        if output.status.success() {
            if let Ok(hash) = String::from_utf8(output.stdout) {
                return hash.trim().to_string();
            }
        }
    }
    "unknown".to_string()
}

fn get_build_date() -> String {
    std::env::var("BUILD_DATE").ok().filter(|d| !d.is_empty()).unwrap_or_else(|| "unknown".to_string())
}

/// Assembles the tenant-scoped, tool-calling, and admin route tables.
/// Takes the already-built `AppState` because the admin and metrics routes
/// are gated by `from_fn_with_state`, which needs a concrete state value.
pub fn create_api_router(app_state: &AppState) -> Router<AppState> {
    let tools = Router::new()
        .route("/tools/retrieve_context", post(handlers::retrieval::retrieve_context))
        .route("/tools/execute_action", post(handlers::actions::execute_action))
        .route("/orchestrator/decide", post(handlers::orchestrator::decide))
        .route("/search", post(handlers::retrieval::search));

    let files = Router::new()
        .route("/files", post(handlers::files::upload))
        .route("/files", get(handlers::files::list))
        .route("/files/{id}", get(handlers::files::get))
        .route("/files/{id}", delete(handlers::files::delete))
        .route("/files/{id}/purge", delete(handlers::files::purge))
        .route("/files/{id}/reingest", post(handlers::files::reingest));

    let webhooks = Router::new()
        .route("/webhooks/wa/inbound/form", post(handlers::webhook::inbound_form))
        .route("/webhooks/wa/inbound/json", post(handlers::webhook::inbound_json));

    let admin = Router::new()
        .route("/admin/jobs/requeue", post(handlers::admin::requeue_dlq))
        .route("/admin/jobs/requeue-one", post(handlers::admin::requeue_one))
        .route("/admin/jobs/pause", post(handlers::admin::pause))
        .route("/admin/jobs/dlq", get(handlers::admin::dlq))
        .route("/admin/jobs/stats", get(handlers::admin::stats))
        .route("/admin/jobs/next", get(handlers::admin::next))
        .route("/admin/ocr/run-once", post(handlers::admin::ocr_run_once))
        .route("/admin/ocr/enable", post(handlers::admin::ocr_enable))
        .route("/admin/ocr/stats", get(handlers::admin::ocr_stats))
        .route("/admin/purge-deleted", post(handlers::admin::purge_deleted));

    Router::new()
        .merge(tools)
        .merge(files)
        .merge(webhooks)
        .merge(admin.route_layer(axum_middleware::from_fn_with_state(app_state.clone(), middleware::admin_auth_middleware)))
}

/// Builds every provider, the retrieval/action/ingestion/orchestrator
/// stack, and spawns the scheduler and janitor workers, then serves HTTP
/// until `ctrl_c`.
pub async fn run_api_server(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(config.database.connection_string().expose_secret())
        .await
        .map_err(|e| Error::Internal(format!("failed to connect to database: {e}")))?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| Error::Internal(format!("migration failed: {e}")))?;

    let metrics = Arc::new(metrics::Metrics::new().map_err(|e| Error::Internal(format!("failed to build metrics registry: {e}")))?);

    let redis_store = Arc::new(ephemeral::RedisEphemeralStore::connect(&config.redis.url).await?);

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.providers.http_timeout_seconds))
        .build()
        .map_err(|e| Error::Internal(format!("failed to build http client: {e}")))?;

    let llm: Arc<dyn providers::LlmProvider> = Arc::new(providers::OpenAiCompatibleProvider::new(
        http_client.clone(),
        config.providers.llm_base_url.clone(),
        config.providers.llm_api_key.clone(),
        config.providers.llm_model.clone(),
    ));
    let embedder: Arc<dyn providers::EmbeddingProvider> = Arc::new(providers::HttpEmbeddingProvider::new(
        http_client.clone(),
        config.providers.embedding_base_url.clone(),
        config.providers.embedding_api_key.clone(),
        config.providers.embedding_model.clone(),
    ));
    let ocr: Arc<dyn providers::OcrProvider> = Arc::new(providers::SubprocessOcrProvider::new(config.providers.ocr_binary.clone(), config.ingestion.ocr_timeout_seconds));
    let whatsapp: Arc<dyn providers::WhatsAppProvider> = Arc::new(providers::WhatsAppTwilioProvider::new(
        http_client.clone(),
        config.providers.whatsapp_account_sid.clone(),
        config.webhook.provider_auth_token.clone(),
    ));
    let calendar: Option<Arc<dyn providers::CalendarProvider>> = Some(Arc::new(providers::GoogleCalendarProvider::new(http_client.clone())));

    let storage = ingestion::ContentAddressedStore::new(std::env::var("AUTOWA_STORAGE_DIR").unwrap_or_else(|_| "./data/files".to_string()));

    let vector_searcher = retrieval::VectorSearcher::new(embedder.clone(), redis_store.clone());
    let retrieval_engine = retrieval::RetrievalEngine::new(pool.clone(), config.retrieval.clone(), vector_searcher);

    let executor = actions::ActionExecutor::new(pool.clone(), calendar, config.admin.clone());

    let ingestion_pipeline = ingestion::IngestionPipeline::new(pool.clone(), storage.clone(), ocr, embedder, config.ingestion.clone(), metrics.clone());

    let orchestrator = Arc::new(orchestrator::Orchestrator::new(llm, retrieval_engine.clone(), executor.clone(), config.orchestrator.clone(), pool.clone()));

    let router = router::MessageRouter::new(
        pool.clone(),
        redis_store.clone(),
        redis_store.clone(),
        redis_store.clone(),
        whatsapp,
        orchestrator.clone(),
        config.webhook.clone(),
        config.debounce.clone(),
        config.ratelimit.clone(),
    );

    let jobs = scheduler::JobDispatcher::new(pool.clone(), ingestion_pipeline.clone(), config.scheduler.clone(), metrics.clone());

    let app_state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        metrics,
        router: router.clone(),
        orchestrator,
        retrieval: retrieval_engine,
        executor,
        ingestion: ingestion_pipeline.clone(),
        storage: storage.clone(),
        jobs: jobs.clone(),
    };

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    tokio::spawn(jobs.clone().run(shutdown_tx.subscribe()));
    tokio::spawn(workers::purge_worker(pool.clone(), storage, config.ingestion.purge_window_days.max(1) as u64 * 3600, shutdown_tx.subscribe()));
    tokio::spawn(workers::retry_worker(pool, ingestion_pipeline, config.scheduler.poll_interval_seconds, shutdown_tx.subscribe()));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::health::metrics).route_layer(axum_middleware::from_fn_with_state(app_state.clone(), middleware::metrics_auth_middleware)))
        .merge(create_api_router(&app_state))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id_middleware))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request<_>| {
                        let request_id = request
                            .headers()
                            .get(&middleware::request_id::REQUEST_ID_HEADER)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown")
                            .to_string();
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id,
                            status = tracing::field::Empty,
                            latency = tracing::field::Empty,
                        )
                    }),
                )
                .layer(SetResponseHeaderLayer::if_not_present(axum::http::header::X_CONTENT_TYPE_OPTIONS, axum::http::HeaderValue::from_static("nosniff")))
                .layer(SetResponseHeaderLayer::if_not_present(axum::http::header::X_FRAME_OPTIONS, axum::http::HeaderValue::from_static("DENY")))
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(CompressionLayer::new())
                .layer(DefaultBodyLimit::max(config.webhook.max_payload_bytes.max(config.ingestion.max_upload_bytes))),
        )
        .with_state(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.map_err(Error::Io)?;

    tracing::info!("autowa listening on http://{} (commit {}, built {})", addr, get_git_commit_hash(), get_build_date());

    let shutdown_signal = {
        let router = router.clone();
        async move {
            tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
            tracing::info!("shutdown signal received");
            router.shutdown();
            let _ = shutdown_tx.send(());
        }
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await.map_err(Error::Io)?;

    Ok(())
}
