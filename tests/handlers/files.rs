use crate::common::database::seed_workspace;
use crate::common::TestApp;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

fn upload_form() -> Form {
    Form::new().part("file", Part::bytes(b"hours: mon-fri 9-5".to_vec()).file_name("hours.txt").mime_str("text/plain").unwrap())
}

#[tokio::test]
async fn uploading_the_same_bytes_twice_is_a_dedup_not_a_new_file() {
    let app = TestApp::spawn().await;
    let (workspace_id, _channel_id) = seed_workspace(&app.pool, "files_dedup").await;

    let first = app
        .client
        .post(app.url("/files"))
        .header("x-workspace-id", workspace_id.to_string())
        .multipart(upload_form())
        .send()
        .await
        .expect("first upload failed");
    assert_eq!(first.status(), 201);
    let first_body: Value = first.json().await.unwrap();
    assert_eq!(first_body["status"], "uploaded");

    let second = app
        .client
        .post(app.url("/files"))
        .header("x-workspace-id", workspace_id.to_string())
        .multipart(upload_form())
        .send()
        .await
        .expect("second upload failed");
    assert_eq!(second.status(), 201);
    let second_body: Value = second.json().await.unwrap();
    assert_eq!(second_body["status"], "duplicate");
    assert_eq!(second_body["file_id"], first_body["file_id"]);
}

#[tokio::test]
async fn upload_without_a_workspace_header_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.client.post(app.url("/files")).multipart(upload_form()).send().await.expect("request failed");

    assert_eq!(response.status(), 422);
}
