//! Retrieval endpoints (§6.3): the orchestrator-facing tool call and the
//! general-purpose paginated search used by admin tooling and tests.

use crate::error::{Error, Result, ValidationErrors};
use crate::middleware::WorkspaceId;
use crate::retrieval::{Cursor, Filter, PaginationMode, SearchRequest};
use crate::state::AppState;
use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RetrieveContextRequest {
    pub conversation_id: Uuid,
    pub query: String,
    #[serde(default)]
    pub slots: serde_json::Value,
    #[serde(default)]
    pub filters: HashMap<String, Filter>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub hybrid: bool,
}

fn default_top_k() -> usize {
    8
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct RetrieveContextResponse {
    pub results: Vec<crate::models::SearchHit>,
    pub query: String,
    pub total_results: usize,
    pub processing_time_ms: u128,
}

/// `POST /tools/retrieve_context`: the shape the orchestrator's own
/// `RetrieveContext` tool call uses, kept separate from `/search` so the
/// conversational surface can evolve independently of the general one.
pub async fn retrieve_context(
    State(state): State<AppState>,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(req): Json<RetrieveContextRequest>,
) -> Result<Json<RetrieveContextResponse>> {
    let started = Instant::now();
    let top_k = req.top_k.min(20).max(1);

    let response = state
        .retrieval
        .search(SearchRequest { workspace_id, query: req.query.clone(), filters: req.filters, top_k, hybrid: req.hybrid, cursor: None })
        .await?;

    Ok(Json(RetrieveContextResponse {
        total_results: response.results.len(),
        results: response.results,
        query: req.query,
        processing_time_ms: started.elapsed().as_millis(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchApiRequest {
    pub workspace_id: Uuid,
    pub query: String,
    #[serde(default)]
    pub filters: HashMap<String, Filter>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub hybrid: bool,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Serialize)]
pub struct SearchApiResponse {
    pub results: Vec<crate::models::SearchHit>,
    pub search_type: crate::models::SearchMethod,
    pub next_cursor: Option<Cursor>,
    pub pagination_mode: PaginationMode,
    pub degraded: bool,
}

/// `POST /search`: the general-purpose search surface. The header and body
/// workspace ids must agree; letting them diverge would let a caller read
/// another tenant's chunks by spoofing the body (§6.3).
pub async fn search(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, Json(req): Json<SearchApiRequest>) -> Result<Json<SearchApiResponse>> {
    if req.workspace_id != workspace_id {
        return Err(Error::Forbidden("X-Workspace-Id does not match request body workspace_id".to_string()));
    }
    if req.top_k == 0 || req.top_k > 50 {
        return Err(Error::Validation(ValidationErrors::Single {
            field: "top_k".to_string(),
            message: "top_k must be between 1 and 50".to_string(),
        }));
    }

    let response = state
        .retrieval
        .search(SearchRequest { workspace_id, query: req.query, filters: req.filters, top_k: req.top_k, hybrid: req.hybrid, cursor: req.cursor })
        .await?;

    let pagination_mode = if response.search_type == crate::models::SearchMethod::Bm25 && !req.hybrid {
        PaginationMode::Keyset
    } else {
        PaginationMode::HybridIndex
    };

    Ok(Json(SearchApiResponse {
        results: response.results,
        search_type: response.search_type,
        next_cursor: response.next_cursor,
        pagination_mode,
        degraded: response.degraded,
    }))
}
