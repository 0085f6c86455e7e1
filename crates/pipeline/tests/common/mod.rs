#![allow(dead_code)]

use std::sync::Arc;

use prism_core::cost::PerSecondPricing;
use prism_db::memory::{MemoryJobStore, MemoryRouteCatalog};
use prism_db::models::model_route::CreateModelRoute;
use prism_events::EventBus;
use prism_pipeline::{
    GenerationService, JobLifecycleManager, ServiceConfig, SubmitRequest, WebhookReceiver,
};
use prism_providers::mock::{self, MockAdapter};
use prism_providers::ModelRegistry;
use serde_json::json;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Everything a pipeline test needs, wired to in-memory collaborators.
pub struct Harness {
    pub store: Arc<MemoryJobStore>,
    pub catalog: Arc<MemoryRouteCatalog>,
    pub adapter: Arc<MockAdapter>,
    pub events: Arc<EventBus>,
    pub lifecycle: Arc<JobLifecycleManager>,
    pub service: Arc<GenerationService>,
    pub registry: Arc<ModelRegistry>,
}

impl Harness {
    pub fn webhook_receiver(&self, strict: bool) -> WebhookReceiver {
        WebhookReceiver::new(self.registry.clone(), self.lifecycle.clone(), strict)
    }
}

pub fn route(identifier: &str) -> CreateModelRoute {
    CreateModelRoute {
        identifier: identifier.to_string(),
        display_name: identifier.to_string(),
        provider: mock::PROVIDER_NAME.to_string(),
        remote_model: format!("acme/{identifier}"),
        remote_version: None,
        supports_webhook: Some(true),
        supports_cancel: Some(true),
        is_enabled: Some(true),
        price_per_second_cents: Some(0.5),
    }
}

/// Build a harness with an enabled `flux` route, a disabled `retired`
/// route and a public base URL so submissions carry a callback.
pub async fn harness() -> Harness {
    let store = Arc::new(MemoryJobStore::new());
    let catalog = Arc::new(MemoryRouteCatalog::new());
    catalog.insert(route("flux")).await;
    catalog
        .insert(CreateModelRoute {
            is_enabled: Some(false),
            ..route("retired")
        })
        .await;

    let adapter = Arc::new(MockAdapter::new(WEBHOOK_SECRET));
    let mut registry = ModelRegistry::new(catalog.clone());
    registry.register(adapter.clone());
    let registry = Arc::new(registry);

    let events = Arc::new(EventBus::default());
    let lifecycle = Arc::new(JobLifecycleManager::new(
        store.clone(),
        catalog.clone(),
        Arc::new(PerSecondPricing),
        events.clone(),
    ));
    let service = Arc::new(GenerationService::new(
        registry.clone(),
        lifecycle.clone(),
        ServiceConfig {
            public_base_url: Some("https://app.example.com".to_string()),
            stale_job_secs: 900,
        },
    ));

    Harness {
        store,
        catalog,
        adapter,
        events,
        lifecycle,
        service,
        registry,
    }
}

pub fn submit_request(model: &str) -> SubmitRequest {
    SubmitRequest {
        model: model.to_string(),
        input: json!({ "prompt": "a lighthouse at dusk" }),
        requested_by: 1,
        project_id: Some(10),
        field_id: None,
        webhook_url: None,
        stream: false,
    }
}

/// A provider prediction body, as pushed to the webhook endpoint.
pub fn prediction_body(external_id: &str, status: &str, output: serde_json::Value) -> Vec<u8> {
    json!({
        "id": external_id,
        "status": status,
        "output": output,
        "error": null,
        "metrics": { "predict_time": 3.2 }
    })
    .to_string()
    .into_bytes()
}
