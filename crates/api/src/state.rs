use std::sync::Arc;

use prism_core::cost::PerSecondPricing;
use prism_db::{DbPool, JobStore, RouteCatalog};
use prism_events::EventBus;
use prism_pipeline::{GenerationService, JobLifecycleManager, ServiceConfig, WebhookReceiver};
use prism_providers::ModelRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind an `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool. `None` when jobs are kept in memory.
    pub pool: Option<DbPool>,
    pub config: Arc<ServerConfig>,
    pub registry: Arc<ModelRegistry>,
    pub service: Arc<GenerationService>,
    pub webhooks: Arc<WebhookReceiver>,
    /// Bus carrying `generation.status_changed` events.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the orchestration layer over the given persistence and
    /// provider registry.
    pub fn new(
        config: Arc<ServerConfig>,
        pool: Option<DbPool>,
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn RouteCatalog>,
        registry: ModelRegistry,
    ) -> Self {
        let registry = Arc::new(registry);
        let event_bus = Arc::new(EventBus::default());

        let lifecycle = Arc::new(JobLifecycleManager::new(
            store,
            catalog,
            Arc::new(PerSecondPricing),
            Arc::clone(&event_bus),
        ));
        let service = Arc::new(GenerationService::new(
            Arc::clone(&registry),
            Arc::clone(&lifecycle),
            ServiceConfig {
                public_base_url: config.public_base_url.clone(),
                stale_job_secs: config.stale_job_secs,
            },
        ));
        let webhooks = Arc::new(WebhookReceiver::new(
            Arc::clone(&registry),
            lifecycle,
            config.strict_webhook_validation,
        ));

        Self {
            pool,
            config,
            registry,
            service,
            webhooks,
            event_bus,
        }
    }
}
