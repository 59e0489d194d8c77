use crate::common::TestApp;
use secrecy::ExposeSecret;

#[tokio::test]
async fn admin_routes_reject_a_missing_token() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/admin/jobs/stats")).send().await.expect("request failed");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn admin_routes_reject_a_wrong_token() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/admin/jobs/stats"))
        .header("x-admin-token", "definitely-not-the-right-token")
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn admin_routes_accept_the_configured_token() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/admin/jobs/stats"))
        .header("x-admin-token", app.config.admin.admin_token.expose_secret())
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 200);
}
