//! Action Executor (C7): typed handlers for `create_order`,
//! `schedule_visit`, and `book_slot`/`schedule_appointment`, idempotent on
//! `(workspace, idempotency_key)` and consistent with the catalog (§4.6).

pub mod assignment;
pub mod payloads;

use crate::actions::payloads::{CreateOrderPayload, ScheduleAppointmentPayload, ScheduleVisitPayload};
use crate::config::AdminConfig;
use crate::crypto::decrypt_secret;
use crate::database::DbPool;
use crate::error::{Error, Result};
use crate::models::{ActionExecution, ActionStatus, Appointment, Order, Visit};
use crate::providers::CalendarProvider;
use crate::queries::{actions as action_queries, catalog as catalog_queries};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionOutcome {
    CreateOrder { order: OrderSummary },
    ScheduleVisit { visit_id: Uuid },
    ScheduleAppointment { appointment_id: Uuid, staff_assigned: Option<String> },
    /// A concurrent call on the same idempotency key hasn't finished yet.
    Pending,
    /// The stored execution is terminal but didn't succeed.
    Recorded,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub total: Decimal,
}

/// The §6.5 response envelope: `{action_id, status, summary, details,
/// created_at, eta_minutes}`, plus the typed outcome the orchestrator
/// narrates from.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActionResult {
    pub action_id: Uuid,
    pub status: ActionStatus,
    pub summary: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub eta_minutes: Option<i64>,
    #[serde(skip)]
    pub outcome: ActionOutcome,
}

impl ActionResult {
    fn from_execution(execution: &ActionExecution, eta_minutes: Option<i64>, outcome: ActionOutcome) -> Self {
        Self {
            action_id: execution.id,
            status: execution.status,
            summary: execution.summary.clone(),
            details: execution.details.clone(),
            created_at: execution.created_at,
            eta_minutes,
            outcome,
        }
    }

    /// 202 while a duplicate call is still in flight, 200 once terminal (§6.5).
    pub fn is_in_flight(&self) -> bool {
        self.status == ActionStatus::Processing
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    pool: DbPool,
    calendar: Option<Arc<dyn CalendarProvider>>,
    admin: AdminConfig,
}

impl ActionExecutor {
    pub fn new(pool: DbPool, calendar: Option<Arc<dyn CalendarProvider>>, admin: AdminConfig) -> Self {
        Self { pool, calendar, admin }
    }

    pub async fn create_order(
        &self,
        workspace_id: Uuid,
        conversation_id: Uuid,
        idempotency_key: &str,
        payload: CreateOrderPayload,
    ) -> Result<ActionResult> {
        crate::validation::validate_idempotency_key(idempotency_key)?;
        crate::validation::validate_order_delivery(&payload.delivery_method, payload.address.as_deref())?;
        let fingerprint = fingerprint_payload(&payload)?;
        let eta_minutes = Some(eta_for_order(payload.items.len()));

        let mut conn = self.pool.acquire().await?;
        let (mut execution, preexisting) =
            action_queries::insert_or_claim(&mut conn, workspace_id, conversation_id, "create_order", idempotency_key, &fingerprint).await?;

        if preexisting {
            let outcome = match execution.status {
                ActionStatus::Processing => ActionOutcome::Pending,
                ActionStatus::Success => {
                    let order_id = execution
                        .details
                        .get("order_id")
                        .and_then(|v| v.as_str())
                        .and_then(|s| Uuid::parse_str(s).ok())
                        .ok_or_else(|| Error::Internal("completed create_order execution missing order_id".to_string()))?;
                    let total = execution.details.get("total").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()).unwrap_or(Decimal::ZERO);
                    ActionOutcome::CreateOrder { order: OrderSummary { order_id, total } }
                }
                ActionStatus::Failed | ActionStatus::Cancelled => ActionOutcome::Recorded,
            };
            return Ok(ActionResult::from_execution(&execution, eta_minutes, outcome));
        }

        let mut total = Decimal::ZERO;
        let mut line_items = Vec::new();
        for line in &payload.items {
            let item = catalog_queries::find_menu_item(&mut conn, workspace_id, &line.sku_or_name).await?;
            let line_total = item.price * Decimal::from(line.quantity);
            total += line_total;
            line_items.push(serde_json::json!({
                "sku": item.sku, "name": item.name, "unit_price": item.price,
                "quantity": line.quantity, "line_total": line_total.round_dp(2),
            }));
        }
        total = total.round_dp(2);

        let mut tx = self.pool.begin().await?;
        let order: Order = catalog_queries::insert_order(
            &mut tx,
            workspace_id,
            execution.id,
            serde_json::Value::Array(line_items),
            total,
            &payload.delivery_method,
            payload.address.as_deref(),
            &payload.payment_method,
        )
        .await?;

        let summary_text = format!("order {} for {}", order.id, total);
        let details = serde_json::json!({ "fingerprint": fingerprint, "order_id": order.id, "total": total.to_string() });
        action_queries::finalize(&mut tx, execution.id, ActionStatus::Success, Some(&summary_text), details.clone()).await?;
        action_queries::insert_outbox_event(
            &mut tx,
            workspace_id,
            "order_created",
            serde_json::json!({ "action_execution_id": execution.id, "order_id": order.id }),
        )
        .await?;
        tx.commit().await?;

        execution.status = ActionStatus::Success;
        execution.summary = Some(summary_text);
        execution.details = details;

        Ok(ActionResult::from_execution(
            &execution,
            eta_minutes,
            ActionOutcome::CreateOrder { order: OrderSummary { order_id: order.id, total } },
        ))
    }

    pub async fn schedule_visit(
        &self,
        workspace_id: Uuid,
        conversation_id: Uuid,
        idempotency_key: &str,
        payload: ScheduleVisitPayload,
    ) -> Result<ActionResult> {
        crate::validation::validate_idempotency_key(idempotency_key)?;
        let fingerprint = fingerprint_payload(&payload)?;

        let mut conn = self.pool.acquire().await?;
        let (mut execution, preexisting) =
            action_queries::insert_or_claim(&mut conn, workspace_id, conversation_id, "schedule_visit", idempotency_key, &fingerprint).await?;

        if preexisting {
            let outcome = match execution.status {
                ActionStatus::Processing => ActionOutcome::Pending,
                ActionStatus::Success => {
                    let visit_id = execution
                        .details
                        .get("visit_id")
                        .and_then(|v| v.as_str())
                        .and_then(|s| Uuid::parse_str(s).ok())
                        .ok_or_else(|| Error::Internal("completed schedule_visit execution missing visit_id".to_string()))?;
                    ActionOutcome::ScheduleVisit { visit_id }
                }
                ActionStatus::Failed | ActionStatus::Cancelled => ActionOutcome::Recorded,
            };
            return Ok(ActionResult::from_execution(&execution, None, outcome));
        }

        catalog_queries::get_property(&mut conn, workspace_id, payload.property_id).await?;

        let mut tx = self.pool.begin().await?;
        let visit: Visit = catalog_queries::insert_visit(
            &mut tx,
            workspace_id,
            execution.id,
            payload.property_id,
            payload.preferred_datetime,
            payload.contact_info,
        )
        .await?;

        let summary_text = format!("visit {} scheduled", visit.id);
        let details = serde_json::json!({ "fingerprint": fingerprint, "visit_id": visit.id });
        action_queries::finalize(&mut tx, execution.id, ActionStatus::Success, Some(&summary_text), details.clone()).await?;
        action_queries::insert_outbox_event(
            &mut tx,
            workspace_id,
            "visit_scheduled",
            serde_json::json!({ "action_execution_id": execution.id, "visit_id": visit.id }),
        )
        .await?;
        tx.commit().await?;

        execution.status = ActionStatus::Success;
        execution.summary = Some(summary_text);
        execution.details = details;

        Ok(ActionResult::from_execution(&execution, None, ActionOutcome::ScheduleVisit { visit_id: visit.id }))
    }

    pub async fn schedule_appointment(
        &self,
        workspace_id: Uuid,
        conversation_id: Uuid,
        idempotency_key: &str,
        payload: ScheduleAppointmentPayload,
    ) -> Result<ActionResult> {
        crate::validation::validate_idempotency_key(idempotency_key)?;
        let fingerprint = fingerprint_payload(&payload)?;

        let mut conn = self.pool.acquire().await?;
        let (mut execution, preexisting) = action_queries::insert_or_claim(
            &mut conn,
            workspace_id,
            conversation_id,
            "schedule_appointment",
            idempotency_key,
            &fingerprint,
        )
        .await?;

        if preexisting {
            let outcome = match execution.status {
                ActionStatus::Processing => ActionOutcome::Pending,
                ActionStatus::Success => {
                    let appointment_id = execution
                        .details
                        .get("appointment_id")
                        .and_then(|v| v.as_str())
                        .and_then(|s| Uuid::parse_str(s).ok())
                        .ok_or_else(|| Error::Internal("completed schedule_appointment execution missing appointment_id".to_string()))?;
                    let staff_assigned = execution.details.get("staff_assigned").and_then(|v| v.as_str()).map(str::to_string);
                    ActionOutcome::ScheduleAppointment { appointment_id, staff_assigned }
                }
                ActionStatus::Failed | ActionStatus::Cancelled => ActionOutcome::Recorded,
            };
            return Ok(ActionResult::from_execution(&execution, None, outcome));
        }

        let service = catalog_queries::find_service_type(&mut conn, workspace_id, &payload.service_type_name).await?;
        let staff = assignment::first_available_staff(&mut conn, workspace_id, payload.scheduled_at, service.duration_minutes).await?;

        // The event is created on the workspace's own business calendar
        // (never a staff member's private one), via the workspace's stored
        // OAuth credentials, outside the write transaction below.
        let mut google_event_id = None;
        if let Some(calendar) = &self.calendar {
            let workspace = crate::queries::workspaces::get_workspace(&self.pool, workspace_id).await?;
            let calendar_id = workspace.settings.get("business_calendar_id").and_then(|v| v.as_str());
            let encrypted_token = workspace.settings.get("calendar_access_token").and_then(|v| v.as_str());
            if let (Some(calendar_id), Some(encrypted_token)) = (calendar_id, encrypted_token) {
                if let Ok(token) = decrypt_secret(&self.admin.encryption_key, encrypted_token) {
                    let event = crate::providers::CalendarEvent {
                        calendar_id: calendar_id.to_string(),
                        summary: format!("{} with {}", service.name, payload.client_name),
                        starts_at: payload.scheduled_at,
                        duration_minutes: service.duration_minutes,
                    };
                    google_event_id = calendar.create_event(&token, &event).await.ok();
                }
            }
        }

        let mut tx = self.pool.begin().await?;
        let appointment: Appointment = catalog_queries::insert_appointment(
            &mut tx,
            workspace_id,
            execution.id,
            service.id,
            staff.as_ref().map(|s| s.id),
            payload.scheduled_at,
            service.duration_minutes,
            &payload.client_name,
            payload.client_contact,
            google_event_id.as_deref(),
        )
        .await?;

        let staff_assigned = staff.as_ref().map(|s| s.name.clone());
        let summary_text = format!("appointment {} confirmed", appointment.id);
        let details = serde_json::json!({
            "fingerprint": fingerprint,
            "appointment_id": appointment.id,
            "staff_assigned": staff_assigned,
        });
        action_queries::finalize(&mut tx, execution.id, ActionStatus::Success, Some(&summary_text), details.clone()).await?;
        action_queries::insert_outbox_event(
            &mut tx,
            workspace_id,
            "appointment_booked",
            serde_json::json!({ "action_execution_id": execution.id, "appointment_id": appointment.id }),
        )
        .await?;
        tx.commit().await?;

        execution.status = ActionStatus::Success;
        execution.summary = Some(summary_text);
        execution.details = details;

        Ok(ActionResult::from_execution(
            &execution,
            None,
            ActionOutcome::ScheduleAppointment { appointment_id: appointment.id, staff_assigned },
        ))
    }
}

/// ETA in minutes for a food order: a 15-minute base plus 2 minutes per
/// distinct line item (§4.6).
fn eta_for_order(item_count: usize) -> i64 {
    15 + 2 * item_count as i64
}

/// SHA256 of the canonical JSON payload, stored alongside the idempotency
/// key so a reused key with a different payload can be logged (§4.6).
fn fingerprint_payload<T: serde::Serialize>(payload: &T) -> Result<String> {
    let canonical = serde_jcs::to_string(payload).map_err(|e| Error::Internal(format!("failed to canonicalize payload: {e}")))?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
