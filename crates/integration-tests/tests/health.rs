//! Health endpoints and response headers.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use belgrano_tickets_core::Role;
use belgrano_tickets_integration_tests::{API_KEY, TestApp};
use serde_json::json;

#[tokio::test]
async fn test_health_reports_counts_with_ahorro_down() {
    let app = TestApp::spawn().await;
    app.create_user("admin", "admin@belgranoahorro.com", Role::Admin, "admin123")
        .await;
    let mut client = app.client();
    client
        .ingest(API_KEY, &json!({"numero": "PED-1", "cliente": "Ana"}))
        .await;

    let health = client.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    let body = health.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["ahorro_api"], "unhealthy");
    assert_eq!(body["total_tickets"], 1);
    assert_eq!(body["total_usuarios"], 1);

    assert_eq!(client.get("/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn().await;
    let mut client = app.client();

    let response = client.get("/health/ready").await;
    assert!(response.headers.contains_key("x-request-id"));
    assert_eq!(
        response.headers.get("x-content-type-options").unwrap(),
        "nosniff"
    );
}
