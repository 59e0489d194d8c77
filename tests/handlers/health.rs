use crate::common::TestApp;
use serde_json::Value;

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/health")).send().await.expect("request failed");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("response was not json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "autowa");
}

#[tokio::test]
async fn metrics_requires_the_metrics_key_when_gated() {
    let app = TestApp::spawn().await;
    if !app.config.admin.metrics_gated {
        return;
    }

    let response = app.client.get(app.url("/metrics")).send().await.expect("request failed");
    assert_eq!(response.status(), 401);
}
