//! Shared application state, assembled once in `run_api_server` and cloned
//! cheaply (everything inside is an `Arc` or a pool handle) into every
//! handler via axum's `State` extractor.

use crate::actions::ActionExecutor;
use crate::config::Config;
use crate::database::DbPool;
use crate::ingestion::{ContentAddressedStore, IngestionPipeline};
use crate::metrics::Metrics;
use crate::orchestrator::Orchestrator;
use crate::retrieval::RetrievalEngine;
use crate::router::MessageRouter;
use crate::scheduler::JobDispatcher;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub router: Arc<MessageRouter>,
    pub orchestrator: Arc<Orchestrator>,
    pub retrieval: RetrievalEngine,
    pub executor: ActionExecutor,
    pub ingestion: IngestionPipeline,
    pub storage: ContentAddressedStore,
    pub jobs: JobDispatcher,
}
