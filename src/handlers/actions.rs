//! Direct action execution (§6.5), mirroring the dispatch the orchestrator
//! itself uses internally when a decision resolves to `ExecuteAction`.

use crate::actions::payloads::{CreateOrderPayload, ScheduleAppointmentPayload, ScheduleVisitPayload};
use crate::actions::ActionResult;
use crate::error::{Error, Result, ValidationErrors};
use crate::middleware::WorkspaceId;
use crate::state::AppState;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ExecuteActionRequest {
    pub conversation_id: Uuid,
    pub action_name: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

/// `POST /tools/execute_action`: dispatches by `action_name` to the matching
/// typed executor method, deserializing the loosely-typed payload into its
/// action-specific struct first. Responds with the §6.5 envelope: 200 for a
/// terminal result, 202 while a duplicate call is still in flight.
pub async fn execute_action(
    State(state): State<AppState>,
    WorkspaceId(workspace_id): WorkspaceId,
    Json(req): Json<ExecuteActionRequest>,
) -> Result<(StatusCode, Json<ActionResult>)> {
    let result: ActionResult = match req.action_name.as_str() {
        "create_order" => {
            let payload: CreateOrderPayload = serde_json::from_value(req.payload)?;
            state.executor.create_order(workspace_id, req.conversation_id, &req.idempotency_key, payload).await?
        }
        "schedule_visit" => {
            let payload: ScheduleVisitPayload = serde_json::from_value(req.payload)?;
            state.executor.schedule_visit(workspace_id, req.conversation_id, &req.idempotency_key, payload).await?
        }
        "schedule_appointment" => {
            let payload: ScheduleAppointmentPayload = serde_json::from_value(req.payload)?;
            state.executor.schedule_appointment(workspace_id, req.conversation_id, &req.idempotency_key, payload).await?
        }
        other => {
            return Err(Error::Validation(ValidationErrors::Single {
                field: "action_name".to_string(),
                message: format!("unknown action {other}"),
            }))
        }
    };

    let status = if result.is_in_flight() { StatusCode::ACCEPTED } else { StatusCode::OK };
    Ok((status, Json(result)))
}
