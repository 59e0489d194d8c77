//! "First available" staff auto-assignment (§4.6): walks active staff in a
//! stable order and picks the first with no conflicting appointment.

use crate::database::DbConn;
use crate::error::Result;
use crate::models::StaffMember;
use crate::queries::catalog as catalog_queries;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub async fn first_available_staff(
    conn: &mut DbConn,
    workspace_id: Uuid,
    scheduled_at: DateTime<Utc>,
    duration_minutes: i32,
) -> Result<Option<StaffMember>> {
    let staff = catalog_queries::active_staff(conn, workspace_id).await?;
    for member in staff {
        let conflict = catalog_queries::staff_has_conflict(conn, workspace_id, member.id, scheduled_at, duration_minutes).await?;
        if !conflict {
            return Ok(Some(member));
        }
    }
    Ok(None)
}
