//! Repository for the `model_routes` table.

use sqlx::PgPool;

use crate::models::model_route::{CreateModelRoute, ModelRoute, RouteSchema};

/// Column list for `model_routes` queries.
const COLUMNS: &str = "\
    id, identifier, display_name, provider, remote_model, remote_version, \
    supports_webhook, supports_cancel, is_enabled, price_per_second_cents, \
    input_schema, schema_refreshed_at, created_at, updated_at";

/// Provides persistence operations for model routes.
pub struct ModelRouteRepo;

impl ModelRouteRepo {
    /// Insert a route, or overwrite the routing fields of an existing one
    /// with the same identifier. Refreshed schema metadata is kept.
    pub async fn upsert(pool: &PgPool, input: &CreateModelRoute) -> Result<ModelRoute, sqlx::Error> {
        let query = format!(
            "INSERT INTO model_routes \
                 (identifier, display_name, provider, remote_model, remote_version, \
                  supports_webhook, supports_cancel, is_enabled, price_per_second_cents) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (identifier) DO UPDATE SET \
                 display_name = EXCLUDED.display_name, \
                 provider = EXCLUDED.provider, \
                 remote_model = EXCLUDED.remote_model, \
                 remote_version = EXCLUDED.remote_version, \
                 supports_webhook = EXCLUDED.supports_webhook, \
                 supports_cancel = EXCLUDED.supports_cancel, \
                 is_enabled = EXCLUDED.is_enabled, \
                 price_per_second_cents = EXCLUDED.price_per_second_cents, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModelRoute>(&query)
            .bind(&input.identifier)
            .bind(&input.display_name)
            .bind(&input.provider)
            .bind(&input.remote_model)
            .bind(&input.remote_version)
            .bind(input.supports_webhook.unwrap_or(true))
            .bind(input.supports_cancel.unwrap_or(true))
            .bind(input.is_enabled.unwrap_or(true))
            .bind(input.price_per_second_cents)
            .fetch_one(pool)
            .await
    }

    /// Find a route by identifier, enabled or not.
    pub async fn find_by_identifier(
        pool: &PgPool,
        identifier: &str,
    ) -> Result<Option<ModelRoute>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM model_routes WHERE identifier = $1");
        sqlx::query_as::<_, ModelRoute>(&query)
            .bind(identifier)
            .fetch_optional(pool)
            .await
    }

    /// List enabled routes ordered by identifier.
    pub async fn list_enabled(pool: &PgPool) -> Result<Vec<ModelRoute>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM model_routes WHERE is_enabled ORDER BY identifier ASC"
        );
        sqlx::query_as::<_, ModelRoute>(&query).fetch_all(pool).await
    }

    /// Merge refreshed provider metadata into a route.
    pub async fn update_schema(
        pool: &PgPool,
        identifier: &str,
        schema: &RouteSchema,
    ) -> Result<Option<ModelRoute>, sqlx::Error> {
        let query = format!(
            "UPDATE model_routes SET \
                 input_schema = COALESCE($2, input_schema), \
                 remote_version = COALESCE($3, remote_version), \
                 schema_refreshed_at = NOW(), \
                 updated_at = NOW() \
             WHERE identifier = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ModelRoute>(&query)
            .bind(identifier)
            .bind(&schema.input_schema)
            .bind(&schema.remote_version)
            .fetch_optional(pool)
            .await
    }
}
