mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use prism_core::report::StatusReport;
use prism_core::status::GenerationStatus;
use prism_db::store::JobStore;
use serde_json::json;

use common::{body_json, build_test_app, get, post_json, send, submit_flux};

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_201_with_both_ids() {
    let app = build_test_app().await;
    let response = post_json(
        &app,
        "/api/v1/generations",
        json!({
            "model": "flux",
            "input": { "prompt": "a lighthouse" },
            "requested_by": 1,
            "project_id": 4
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["external_id"], "mock-1");
    assert_eq!(json["data"]["project_id"], 4);
}

#[tokio::test]
async fn submit_unknown_model_returns_404_and_creates_nothing() {
    let app = build_test_app().await;
    let response = post_json(
        &app,
        "/api/v1/generations",
        json!({ "model": "nope", "input": {}, "requested_by": 1 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "MODEL_NOT_FOUND");
    assert_eq!(app.store.job_count().await, 0);
}

#[tokio::test]
async fn submit_disabled_model_returns_409() {
    let app = build_test_app().await;
    let response = post_json(
        &app,
        "/api/v1/generations",
        json!({ "model": "retired", "input": {}, "requested_by": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_with_empty_model_returns_400() {
    let app = build_test_app().await;
    let response = post_json(
        &app,
        "/api/v1/generations",
        json!({ "model": " ", "input": {}, "requested_by": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_rejection_returns_422_and_records_failure() {
    let app = build_test_app().await;
    app.adapter
        .fail_next_submit(prism_providers::ProviderError::InvalidInput("bad seed".into()));

    let response = post_json(
        &app,
        "/api/v1/generations",
        json!({ "model": "flux", "input": { "seed": -1 }, "requested_by": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "bad seed");

    let job = app.store.get_job_by_id(1).await.unwrap().unwrap();
    assert_eq!(job.status, GenerationStatus::Failed);
}

// ---------------------------------------------------------------------------
// Status check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_check_sets_no_cache_headers() {
    let app = build_test_app().await;
    let (id, _) = submit_flux(&app).await;

    let response = get(&app, &format!("/api/v1/generations/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(
        headers["cache-control"],
        "no-store, no-cache, must-revalidate, max-age=0"
    );
    assert_eq!(headers["pragma"], "no-cache");
    assert_eq!(headers["expires"], "0");
    assert_eq!(headers["cdn-cache-control"], "no-store");
    assert_eq!(headers["surrogate-control"], "no-store");
}

#[tokio::test]
async fn status_check_polls_provider_and_normalizes_media() {
    let app = build_test_app().await;
    let (id, ext) = submit_flux(&app).await;
    app.adapter.set_report(
        StatusReport::new(ext, GenerationStatus::Succeeded)
            .with_output(json!(["https://x/a.png", "not-a-url", "https://x/b.mp4"])),
    );

    let json = body_json(get(&app, &format!("/api/v1/generations/{id}")).await).await;
    assert_eq!(json["data"]["status"], "succeeded");
    assert!(json["data"]["error_message"].is_null());

    let media = body_json(get(&app, &format!("/api/v1/generations/{id}/media")).await).await;
    let media = media["data"].as_array().unwrap();
    assert_eq!(media.len(), 2);
    assert_eq!(media[0]["kind"], "image");
    assert_eq!(media[1]["kind"], "video");
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = build_test_app().await;
    let response = get(&app, "/api/v1/generations/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stale_listing_reports_quiet_jobs() {
    let app = build_test_app().await;
    let (id, _) = submit_flux(&app).await;
    app.store
        .set_updated_at(id, Utc::now() - Duration::hours(2))
        .await;

    let json = body_json(get(&app, "/api/v1/generations/stale?older_than_secs=3600").await).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["id"], id);

    let response = get(&app, "/api/v1/generations/stale?older_than_secs=-1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_running_job_via_post_and_delete() {
    let app = build_test_app().await;
    let (a, _) = submit_flux(&app).await;
    let (b, _) = submit_flux(&app).await;

    let response = post_json(&app, &format!("/api/v1/generations/{a}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "canceled");

    let request = Request::delete(format!("/api/v1/generations/{b}"))
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "canceled");
    assert_eq!(json["data"]["error_message"], "Generation canceled");
}

#[tokio::test]
async fn cancel_succeeded_job_returns_409_and_keeps_state() {
    let app = build_test_app().await;
    let (id, ext) = submit_flux(&app).await;
    app.adapter.set_report(
        StatusReport::new(ext, GenerationStatus::Succeeded).with_output(json!("https://x/a.png")),
    );
    get(&app, &format!("/api/v1/generations/{id}")).await;

    let response = post_json(&app, &format!("/api/v1/generations/{id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "NOT_CANCELABLE");

    let job = app.store.get_job_by_id(id).await.unwrap().unwrap();
    assert_eq!(job.status, GenerationStatus::Succeeded);
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

#[tokio::test]
async fn models_lists_enabled_routes_only() {
    let app = build_test_app().await;
    let json = body_json(get(&app, "/api/v1/models").await).await;
    let models = json["data"].as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["identifier"], "flux");
}

#[tokio::test]
async fn refresh_schema_stores_provider_metadata() {
    let app = build_test_app().await;
    app.adapter.set_schema(prism_db::models::model_route::RouteSchema {
        input_schema: Some(json!({ "type": "object" })),
        remote_version: None,
    });

    let response = post_json(&app, "/api/v1/models/flux/refresh-schema", json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["input_schema"]["type"], "object");

    let response = post_json(&app, "/api/v1/models/nope/refresh-schema", json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
