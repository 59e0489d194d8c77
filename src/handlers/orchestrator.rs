//! Direct orchestrator invocation (§6.2), used by tooling and tests that
//! want to drive a decision turn without a real WhatsApp round-trip.

use crate::error::Result;
use crate::middleware::WorkspaceId;
use crate::orchestrator::{ConversationSnapshot, DecideResponse};
use crate::state::AppState;
use axum::extract::{Json, State};

pub async fn decide(State(state): State<AppState>, WorkspaceId(workspace_id): WorkspaceId, Json(mut snapshot): Json<ConversationSnapshot>) -> Result<Json<DecideResponse>> {
    snapshot.workspace_id = workspace_id;
    let response = state.orchestrator.decide(snapshot).await?;
    Ok(Json(response))
}
