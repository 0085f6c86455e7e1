#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use prism_api::config::{LogFormat, ServerConfig};
use prism_api::router::build_app_router;
use prism_api::state::AppState;
use prism_db::memory::{MemoryJobStore, MemoryRouteCatalog};
use prism_db::models::model_route::CreateModelRoute;
use prism_providers::mock::{self, MockAdapter};
use prism_providers::ModelRegistry;
use tower::ServiceExt;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Build a test `ServerConfig` with safe defaults: in-memory storage,
/// strict webhook validation and a public base URL.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        database_url: None,
        public_base_url: Some("https://app.example.com".to_string()),
        strict_webhook_validation: true,
        replicate: None,
        enable_mock_provider: true,
        mock_webhook_secret: WEBHOOK_SECRET.to_string(),
        model_routes_path: None,
        stale_job_secs: 900,
        poll_interval_secs: 0,
        log_format: LogFormat::Text,
    }
}

/// A running test application and handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    pub adapter: Arc<MockAdapter>,
}

pub async fn build_test_app() -> TestApp {
    build_test_app_with(test_config()).await
}

/// Build the full application router with all middleware layers over
/// in-memory storage and the scripted provider.
///
/// Registers an enabled `flux` route and a disabled `retired` route.
pub async fn build_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryJobStore::new());
    let catalog = Arc::new(MemoryRouteCatalog::new());
    for (identifier, enabled) in [("flux", true), ("retired", false)] {
        catalog
            .insert(CreateModelRoute {
                identifier: identifier.to_string(),
                display_name: identifier.to_string(),
                provider: mock::PROVIDER_NAME.to_string(),
                remote_model: format!("acme/{identifier}"),
                remote_version: None,
                supports_webhook: Some(true),
                supports_cancel: Some(true),
                is_enabled: Some(enabled),
                price_per_second_cents: None,
            })
            .await;
    }

    let adapter = Arc::new(MockAdapter::new(config.mock_webhook_secret.clone()));
    let mut registry = ModelRegistry::new(catalog.clone());
    registry.register(adapter.clone());

    let config = Arc::new(config);
    let state = AppState::new(
        Arc::clone(&config),
        None,
        store.clone(),
        catalog,
        registry,
    );

    TestApp {
        router: build_app_router(state, &config),
        store,
        adapter,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_webhook(app: &TestApp, body: &[u8], signature: Option<&str>) -> Response<Body> {
    let mut builder = Request::post("/api/v1/webhooks/mock").header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header("x-webhook-signature", sig);
    }
    send(app, builder.body(Body::from(body.to_vec())).unwrap()).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Submit a generation for `flux` and return its internal and external ids.
pub async fn submit_flux(app: &TestApp) -> (i64, String) {
    let response = post_json(
        app,
        "/api/v1/generations",
        serde_json::json!({
            "model": "flux",
            "input": { "prompt": "a lighthouse at dusk" },
            "requested_by": 1
        }),
    )
    .await;
    assert_eq!(response.status(), 201);
    let json = body_json(response).await;
    (
        json["data"]["id"].as_i64().unwrap(),
        json["data"]["external_id"].as_str().unwrap().to_string(),
    )
}
