//! Dialog Orchestrator (C8): a stateless-per-call, vertical-aware decision
//! procedure that turns one conversation turn into exactly one next action
//! (§4.7).

pub mod business_hours;
pub mod decide;
pub mod policy;
pub mod rate_guard;
pub mod slots;

pub use decide::{ConversationSnapshot, DecideResponse, NextAction, ToolCall};
pub use policy::PolicyConfig;

use crate::actions::ActionExecutor;
use crate::config::OrchestratorConfig;
use crate::database::DbPool;
use crate::error::Result;
use crate::providers::LlmProvider;
use crate::retrieval::RetrievalEngine;
use rate_guard::RateGuard;
use std::sync::Arc;

pub struct Orchestrator {
    llm: Arc<dyn LlmProvider>,
    retrieval: RetrievalEngine,
    executor: ActionExecutor,
    config: OrchestratorConfig,
    rate_guard: RateGuard,
    pool: DbPool,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, retrieval: RetrievalEngine, executor: ActionExecutor, config: OrchestratorConfig, pool: DbPool) -> Self {
        let rate_guard = RateGuard::new(config.rate_guard_base_ms, config.rate_guard_jitter_ms);
        Self { llm, retrieval, executor, config, rate_guard, pool }
    }

    /// Runs the single-pass decision procedure for one conversation turn.
    pub async fn decide(&self, snapshot: ConversationSnapshot) -> Result<DecideResponse> {
        decide::run(self, snapshot).await
    }
}
