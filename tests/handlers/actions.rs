use crate::common::database::seed_workspace;
use crate::common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

/// Seeds a conversation + a single menu item under the given workspace, so
/// `create_order` has something to price.
async fn seed_conversation_and_menu_item(pool: &sqlx::PgPool, workspace_id: Uuid, channel_id: Uuid) -> Uuid {
    let contact_id: Uuid = sqlx::query_scalar("INSERT INTO contacts (workspace_id, phone) VALUES ($1, $2) RETURNING id")
        .bind(workspace_id)
        .bind(format!("whatsapp:+1555{:07}", rand::random::<u32>() % 10_000_000))
        .fetch_one(pool)
        .await
        .expect("failed to seed contact");

    let conversation_id: Uuid = sqlx::query_scalar(
        "INSERT INTO conversations (workspace_id, channel_id, contact_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(workspace_id)
    .bind(channel_id)
    .bind(contact_id)
    .fetch_one(pool)
    .await
    .expect("failed to seed conversation");

    sqlx::query("INSERT INTO menu_items (workspace_id, sku, name, price) VALUES ($1, 'BURGER', 'Burger', 9.50)")
        .bind(workspace_id)
        .execute(pool)
        .await
        .expect("failed to seed menu item");

    conversation_id
}

#[tokio::test]
async fn create_order_delivery_without_address_is_rejected() {
    let app = TestApp::spawn().await;
    let (workspace_id, channel_id) = seed_workspace(&app.pool, "actions_delivery_validation").await;
    let conversation_id = seed_conversation_and_menu_item(&app.pool, workspace_id, channel_id).await;

    let response = app
        .client
        .post(app.url("/tools/execute_action"))
        .header("x-workspace-id", workspace_id.to_string())
        .json(&json!({
            "conversation_id": conversation_id,
            "action_name": "create_order",
            "idempotency_key": "order-no-address",
            "payload": {
                "items": [{ "sku_or_name": "BURGER", "quantity": 1 }],
                "delivery_method": "delivery",
                "payment_method": "cash",
            },
        }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn create_order_succeeds_and_returns_the_action_envelope_with_eta() {
    let app = TestApp::spawn().await;
    let (workspace_id, channel_id) = seed_workspace(&app.pool, "actions_create_order").await;
    let conversation_id = seed_conversation_and_menu_item(&app.pool, workspace_id, channel_id).await;

    let response = app
        .client
        .post(app.url("/tools/execute_action"))
        .header("x-workspace-id", workspace_id.to_string())
        .json(&json!({
            "conversation_id": conversation_id,
            "action_name": "create_order",
            "idempotency_key": "order-pickup-1",
            "payload": {
                "items": [{ "sku_or_name": "BURGER", "quantity": 2 }],
                "delivery_method": "pickup",
                "payment_method": "cash",
            },
        }))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["eta_minutes"], 19); // 15 + 2 * 2 items
    assert!(body["details"]["order_id"].is_string());

    let outbox_type: String = sqlx::query_scalar("SELECT event_type FROM outbox_events WHERE workspace_id = $1")
        .bind(workspace_id)
        .fetch_one(&app.pool)
        .await
        .expect("outbox row missing");
    assert_eq!(outbox_type, "order_created");

    let outbox_payload: Value = sqlx::query_scalar("SELECT payload FROM outbox_events WHERE workspace_id = $1")
        .bind(workspace_id)
        .fetch_one(&app.pool)
        .await
        .expect("outbox row missing");
    assert_eq!(outbox_payload["action_execution_id"], body["action_id"]);
}

#[tokio::test]
async fn replaying_the_same_idempotency_key_returns_the_recorded_result() {
    let app = TestApp::spawn().await;
    let (workspace_id, channel_id) = seed_workspace(&app.pool, "actions_idempotent_replay").await;
    let conversation_id = seed_conversation_and_menu_item(&app.pool, workspace_id, channel_id).await;

    let request_body = json!({
        "conversation_id": conversation_id,
        "action_name": "create_order",
        "idempotency_key": "order-replayed",
        "payload": {
            "items": [{ "sku_or_name": "BURGER", "quantity": 1 }],
            "delivery_method": "pickup",
            "payment_method": "cash",
        },
    });

    let first = app
        .client
        .post(app.url("/tools/execute_action"))
        .header("x-workspace-id", workspace_id.to_string())
        .json(&request_body)
        .send()
        .await
        .expect("first request failed");
    assert_eq!(first.status(), 200);
    let first_body: Value = first.json().await.unwrap();

    let second = app
        .client
        .post(app.url("/tools/execute_action"))
        .header("x-workspace-id", workspace_id.to_string())
        .json(&request_body)
        .send()
        .await
        .expect("second request failed");
    assert_eq!(second.status(), 200);
    let second_body: Value = second.json().await.unwrap();

    assert_eq!(first_body["action_id"], second_body["action_id"]);
    assert_eq!(second_body["details"]["order_id"], first_body["details"]["order_id"]);

    let outbox_count: i64 = sqlx::query_scalar("SELECT count(*) FROM outbox_events WHERE workspace_id = $1")
        .bind(workspace_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(outbox_count, 1);
}
