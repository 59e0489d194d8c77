use crate::common::database::init_test_db;
use crate::common::stub_providers::{StubCalendar, StubEmbedder, StubLlm, StubOcr, StubWhatsApp};
use autowa::ephemeral::RedisEphemeralStore;
use autowa::ingestion::{ContentAddressedStore, IngestionPipeline};
use autowa::metrics::Metrics;
use autowa::orchestrator::Orchestrator;
use autowa::retrieval::{RetrievalEngine, VectorSearcher};
use autowa::router::MessageRouter;
use autowa::scheduler::JobDispatcher;
use autowa::{create_api_router, load_config, AppState, Config};
use axum::Router;
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A running instance of the API, backed by a real Postgres/Redis pair and
/// stub external providers, reachable over HTTP on a random local port.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub config: Config,
    pub pool: sqlx::PgPool,
    pub whatsapp: Arc<StubWhatsApp>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let config = load_config().expect("failed to load test config");
        let pool = init_test_db().await;

        let metrics = Arc::new(Metrics::new().expect("failed to build metrics registry"));
        let redis_store = Arc::new(
            RedisEphemeralStore::connect(&config.redis.url)
                .await
                .expect("failed to connect to test redis"),
        );

        let llm = Arc::new(StubLlm::default());
        let embedder = Arc::new(StubEmbedder { dimension: config.ingestion.embedding_dimension });
        let ocr = Arc::new(StubOcr);
        let whatsapp = Arc::new(StubWhatsApp::default());
        let calendar = Arc::new(StubCalendar);

        let storage = ContentAddressedStore::new(std::env::temp_dir().join(format!("autowa-test-{}", uuid::Uuid::new_v4())));
        let vector_searcher = VectorSearcher::new(embedder.clone(), redis_store.clone());
        let retrieval_engine = RetrievalEngine::new(pool.clone(), config.retrieval.clone(), vector_searcher);
        let executor = autowa::actions::ActionExecutor::new(pool.clone(), Some(calendar.clone()), config.admin.clone());
        let ingestion_pipeline =
            IngestionPipeline::new(pool.clone(), storage.clone(), ocr, embedder, config.ingestion.clone(), metrics.clone());
        let orchestrator = Arc::new(Orchestrator::new(llm, retrieval_engine.clone(), executor.clone(), config.orchestrator.clone(), pool.clone()));
        let router = MessageRouter::new(
            pool.clone(),
            redis_store.clone(),
            redis_store.clone(),
            redis_store.clone(),
            whatsapp.clone(),
            orchestrator.clone(),
            config.webhook.clone(),
            config.debounce.clone(),
            config.ratelimit.clone(),
        );
        let jobs = JobDispatcher::new(pool.clone(), ingestion_pipeline.clone(), config.scheduler.clone(), metrics.clone());

        let app_state = AppState {
            pool: pool.clone(),
            config: Arc::new(config.clone()),
            metrics,
            router,
            orchestrator,
            retrieval: retrieval_engine,
            executor,
            ingestion: ingestion_pipeline,
            storage,
            jobs,
        };

        let app: Router = Router::new()
            .route("/health", axum::routing::get(autowa::handlers::health::health))
            .route(
                "/metrics",
                axum::routing::get(autowa::handlers::health::metrics)
                    .route_layer(axum::middleware::from_fn_with_state(app_state.clone(), autowa::middleware::metrics_auth_middleware)),
            )
            .merge(create_api_router(&app_state))
            .with_state(app_state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{port}");

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build http client");

        Self { address, client, config, pool, whatsapp }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}
