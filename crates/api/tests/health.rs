mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get};

#[tokio::test]
async fn health_reports_memory_storage() {
    let app = build_test_app().await;
    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["storage"], "memory");
    assert_eq!(json["db_healthy"], true);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = build_test_app().await;
    let response = get(&app, "/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}
