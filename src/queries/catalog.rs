use crate::database::DbConn;
use crate::error::{Error, Result};
use crate::models::{Appointment, MenuItem, Order, Property, ServiceType, StaffMember, Visit};
use uuid::Uuid;

pub async fn find_menu_item(conn: &mut DbConn, workspace_id: Uuid, sku_or_name: &str) -> Result<MenuItem> {
    sqlx::query_as!(
        MenuItem,
        r#"
        SELECT id, workspace_id, sku, name, price, active FROM menu_items
        WHERE workspace_id = $1 AND active = true AND (sku = $2 OR lower(name) = lower($2))
        "#,
        workspace_id,
        sku_or_name
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("menu item '{sku_or_name}' not found")))
}

pub async fn get_property(conn: &mut DbConn, workspace_id: Uuid, property_id: Uuid) -> Result<Property> {
    sqlx::query_as!(
        Property,
        r#"SELECT id, workspace_id, operation, property_type, zone, available FROM properties
           WHERE workspace_id = $1 AND id = $2 AND available = true"#,
        workspace_id,
        property_id
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("property {property_id} not available")))
}

pub async fn find_service_type(conn: &mut DbConn, workspace_id: Uuid, name: &str) -> Result<ServiceType> {
    sqlx::query_as!(
        ServiceType,
        r#"SELECT id, workspace_id, name, duration_minutes, active FROM service_types
           WHERE workspace_id = $1 AND active = true AND lower(name) = lower($2)"#,
        workspace_id,
        name
    )
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("service type '{name}' not found")))
}

pub async fn active_staff(conn: &mut DbConn, workspace_id: Uuid) -> Result<Vec<StaffMember>> {
    sqlx::query_as!(
        StaffMember,
        r#"SELECT id, workspace_id, name, active, private_calendar_id FROM staff_members
           WHERE workspace_id = $1 AND active = true ORDER BY name"#,
        workspace_id
    )
    .fetch_all(&mut *conn)
    .await
    .map_err(Error::from)
}

pub async fn staff_has_conflict(
    conn: &mut DbConn,
    workspace_id: Uuid,
    staff_id: Uuid,
    scheduled_at: chrono::DateTime<chrono::Utc>,
    duration_minutes: i32,
) -> Result<bool> {
    let row = sqlx::query!(
        r#"
        SELECT count(*) as "count!" FROM appointments
        WHERE workspace_id = $1 AND staff_id = $2 AND status != 'cancelled'
          AND scheduled_at < $3 + make_interval(mins => $4::float8)
          AND $3 < scheduled_at + make_interval(mins => duration_minutes::float8)
        "#,
        workspace_id,
        staff_id,
        scheduled_at,
        duration_minutes as f64,
    )
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.count > 0)
}

pub async fn insert_order(
    conn: &mut DbConn,
    workspace_id: Uuid,
    action_execution_id: Uuid,
    items: serde_json::Value,
    total: rust_decimal::Decimal,
    delivery_method: &str,
    address: Option<&str>,
    payment_method: &str,
) -> Result<Order> {
    sqlx::query_as!(
        Order,
        r#"
        INSERT INTO orders (id, workspace_id, action_execution_id, items, total, delivery_method, address, payment_method, status, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, 'pending', now())
        RETURNING id, workspace_id, action_execution_id, items, total, delivery_method, address, payment_method,
                  status as "status: _", created_at
        "#,
        workspace_id,
        action_execution_id,
        items,
        total,
        delivery_method,
        address,
        payment_method
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(Error::from)
}

pub async fn insert_visit(
    conn: &mut DbConn,
    workspace_id: Uuid,
    action_execution_id: Uuid,
    property_id: Uuid,
    preferred_datetime: chrono::DateTime<chrono::Utc>,
    contact_info: serde_json::Value,
) -> Result<Visit> {
    sqlx::query_as!(
        Visit,
        r#"
        INSERT INTO visits (id, workspace_id, action_execution_id, property_id, preferred_datetime, contact_info, status, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, 'pending', now())
        RETURNING id, workspace_id, action_execution_id, property_id, preferred_datetime, contact_info, status, created_at
        "#,
        workspace_id,
        action_execution_id,
        property_id,
        preferred_datetime,
        contact_info
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(Error::from)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_appointment(
    conn: &mut DbConn,
    workspace_id: Uuid,
    action_execution_id: Uuid,
    service_type_id: Uuid,
    staff_id: Option<Uuid>,
    scheduled_at: chrono::DateTime<chrono::Utc>,
    duration_minutes: i32,
    client_name: &str,
    client_contact: serde_json::Value,
    google_event_id: Option<&str>,
) -> Result<Appointment> {
    sqlx::query_as!(
        Appointment,
        r#"
        INSERT INTO appointments
            (id, workspace_id, action_execution_id, service_type_id, staff_id, scheduled_at,
             duration_minutes, client_name, client_contact, google_event_id, status, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8, $9, 'confirmed', now())
        RETURNING id, workspace_id, action_execution_id, service_type_id, staff_id, scheduled_at,
                  duration_minutes, client_name, client_contact, google_event_id, status, created_at
        "#,
        workspace_id,
        action_execution_id,
        service_type_id,
        staff_id,
        scheduled_at,
        duration_minutes,
        client_name,
        client_contact,
        google_event_id
    )
    .fetch_one(&mut *conn)
    .await
    .map_err(Error::from)
}
