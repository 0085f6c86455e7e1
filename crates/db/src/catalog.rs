//! The model catalog seam consumed by the model registry.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::model_route::{CreateModelRoute, ModelRoute, RouteSchema};
use crate::repositories::ModelRouteRepo;
use crate::store::StoreError;

#[async_trait]
pub trait RouteCatalog: Send + Sync {
    /// Look a route up by identifier, whether enabled or not.
    async fn get_route_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<ModelRoute>, StoreError>;

    async fn list_enabled_routes(&self) -> Result<Vec<ModelRoute>, StoreError>;

    /// Merge refreshed provider metadata into a stored route.
    async fn update_route_schema(
        &self,
        identifier: &str,
        schema: &RouteSchema,
    ) -> Result<Option<ModelRoute>, StoreError>;

    /// Register a route, replacing the routing fields of an existing one.
    async fn upsert_route(&self, input: &CreateModelRoute) -> Result<ModelRoute, StoreError>;
}

/// [`RouteCatalog`] backed by the `model_routes` table.
#[derive(Clone)]
pub struct PgRouteCatalog {
    pool: PgPool,
}

impl PgRouteCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteCatalog for PgRouteCatalog {
    async fn get_route_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<ModelRoute>, StoreError> {
        Ok(ModelRouteRepo::find_by_identifier(&self.pool, identifier).await?)
    }

    async fn list_enabled_routes(&self) -> Result<Vec<ModelRoute>, StoreError> {
        Ok(ModelRouteRepo::list_enabled(&self.pool).await?)
    }

    async fn update_route_schema(
        &self,
        identifier: &str,
        schema: &RouteSchema,
    ) -> Result<Option<ModelRoute>, StoreError> {
        Ok(ModelRouteRepo::update_schema(&self.pool, identifier, schema).await?)
    }

    async fn upsert_route(&self, input: &CreateModelRoute) -> Result<ModelRoute, StoreError> {
        Ok(ModelRouteRepo::upsert(&self.pool, input).await?)
    }
}
