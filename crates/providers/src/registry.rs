//! Model identifier to route and adapter resolution.

use std::collections::HashMap;
use std::sync::Arc;

use prism_db::catalog::RouteCatalog;
use prism_db::models::model_route::ModelRoute;
use prism_db::StoreError;

use crate::adapter::ProviderAdapter;
use crate::error::ProviderError;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown model: {0}")]
    ModelNotFound(String),

    #[error("Model is disabled: {0}")]
    ModelDisabled(String),

    /// The route names a provider no adapter is registered for.
    #[error("No adapter registered for provider '{provider}' (model {identifier})")]
    AdapterMissing {
        provider: String,
        identifier: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// An enabled route together with the adapter that serves it.
#[derive(Clone)]
pub struct ResolvedRoute {
    pub route: ModelRoute,
    pub adapter: Arc<dyn ProviderAdapter>,
}

impl std::fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("route", &self.route)
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

/// Resolves model identifiers against the route catalog.
///
/// Adapters are registered once at startup, keyed by provider name.
pub struct ModelRegistry {
    catalog: Arc<dyn RouteCatalog>,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ModelRegistry {
    pub fn new(catalog: Arc<dyn RouteCatalog>) -> Self {
        Self {
            catalog,
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its own name, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let name = adapter.name().to_string();
        tracing::info!(provider = %name, "Provider adapter registered");
        self.adapters.insert(name, adapter);
    }

    pub fn adapter(&self, provider: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider).cloned()
    }

    /// Resolve an identifier to an enabled route and its adapter.
    pub async fn resolve(&self, identifier: &str) -> Result<ResolvedRoute, RegistryError> {
        let route = self
            .catalog
            .get_route_by_identifier(identifier)
            .await?
            .ok_or_else(|| RegistryError::ModelNotFound(identifier.to_string()))?;

        if !route.is_enabled {
            return Err(RegistryError::ModelDisabled(identifier.to_string()));
        }

        let adapter = self.adapter_for(&route)?;
        Ok(ResolvedRoute { route, adapter })
    }

    /// Look a route up regardless of whether it is enabled.
    pub async fn route(&self, identifier: &str) -> Result<Option<ModelRoute>, RegistryError> {
        Ok(self.catalog.get_route_by_identifier(identifier).await?)
    }

    pub async fn list_enabled(&self) -> Result<Vec<ModelRoute>, RegistryError> {
        Ok(self.catalog.list_enabled_routes().await?)
    }

    /// Pull fresh provider metadata for a route and store it.
    pub async fn refresh_schema(&self, identifier: &str) -> Result<ModelRoute, RegistryError> {
        let route = self
            .catalog
            .get_route_by_identifier(identifier)
            .await?
            .ok_or_else(|| RegistryError::ModelNotFound(identifier.to_string()))?;

        let adapter = self.adapter_for(&route)?;
        let schema = adapter.fetch_schema(&route).await?;

        let updated = self
            .catalog
            .update_route_schema(identifier, &schema)
            .await?
            .ok_or_else(|| RegistryError::ModelNotFound(identifier.to_string()))?;

        tracing::info!(
            model = %identifier,
            has_schema = updated.input_schema.is_some(),
            "Model schema refreshed",
        );
        Ok(updated)
    }

    fn adapter_for(&self, route: &ModelRoute) -> Result<Arc<dyn ProviderAdapter>, RegistryError> {
        self.adapter(&route.provider)
            .ok_or_else(|| RegistryError::AdapterMissing {
                provider: route.provider.clone(),
                identifier: route.identifier.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use prism_db::memory::MemoryRouteCatalog;
    use prism_db::models::model_route::{CreateModelRoute, RouteSchema};
    use serde_json::json;

    use crate::mock::{self, MockAdapter};

    fn create(identifier: &str, provider: &str, enabled: bool) -> CreateModelRoute {
        CreateModelRoute {
            identifier: identifier.into(),
            display_name: identifier.into(),
            provider: provider.into(),
            remote_model: format!("acme/{identifier}"),
            remote_version: None,
            supports_webhook: None,
            supports_cancel: None,
            is_enabled: Some(enabled),
            price_per_second_cents: None,
        }
    }

    async fn registry() -> (ModelRegistry, Arc<MockAdapter>) {
        let catalog = Arc::new(MemoryRouteCatalog::new());
        catalog.insert(create("flux", mock::PROVIDER_NAME, true)).await;
        catalog.insert(create("retired", mock::PROVIDER_NAME, false)).await;
        catalog.insert(create("orphan", "nowhere", true)).await;

        let adapter = Arc::new(MockAdapter::new("s"));
        let mut registry = ModelRegistry::new(catalog);
        registry.register(adapter.clone());
        (registry, adapter)
    }

    #[tokio::test]
    async fn resolves_enabled_route() {
        let (registry, _) = registry().await;
        let resolved = registry.resolve("flux").await.unwrap();
        assert_eq!(resolved.route.identifier, "flux");
        assert_eq!(resolved.adapter.name(), mock::PROVIDER_NAME);
    }

    #[tokio::test]
    async fn resolution_failures_are_distinct() {
        let (registry, _) = registry().await;
        assert_matches!(registry.resolve("nope").await, Err(RegistryError::ModelNotFound(_)));
        assert_matches!(registry.resolve("retired").await, Err(RegistryError::ModelDisabled(_)));
        assert_matches!(
            registry.resolve("orphan").await,
            Err(RegistryError::AdapterMissing { provider, .. }) if provider == "nowhere"
        );
    }

    #[tokio::test]
    async fn lists_only_enabled_routes() {
        let (registry, _) = registry().await;
        let names: Vec<String> = registry
            .list_enabled()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(names, vec!["flux", "orphan"]);
    }

    #[tokio::test]
    async fn refresh_schema_stores_provider_metadata() {
        let (registry, adapter) = registry().await;
        adapter.set_schema(RouteSchema {
            input_schema: Some(json!({ "type": "object" })),
            remote_version: None,
        });

        let route = registry.refresh_schema("flux").await.unwrap();
        assert_eq!(route.input_schema, Some(json!({ "type": "object" })));
        assert!(route.schema_refreshed_at.is_some());
    }

    #[tokio::test]
    async fn refresh_schema_surfaces_unsupported_adapters() {
        let (registry, _) = registry().await;
        assert_matches!(
            registry.refresh_schema("flux").await,
            Err(RegistryError::Provider(ProviderError::Unsupported(_)))
        );
    }
}
