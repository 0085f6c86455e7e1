//! Model routes: how a model identifier reaches a provider.

use prism_core::cost::PricingHint;
use prism_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `model_routes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ModelRoute {
    pub id: DbId,
    /// Identifier callers submit, e.g. `flux-schnell`.
    pub identifier: String,
    pub display_name: String,
    /// Name of the provider adapter that serves this route.
    pub provider: String,
    /// Provider-side model reference, e.g. `black-forest-labs/flux-schnell`.
    pub remote_model: String,
    /// Pinned provider-side version, when the provider requires one.
    pub remote_version: Option<String>,
    pub supports_webhook: bool,
    pub supports_cancel: bool,
    pub is_enabled: bool,
    pub price_per_second_cents: Option<f64>,
    pub input_schema: Option<serde_json::Value>,
    pub schema_refreshed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ModelRoute {
    pub fn pricing(&self) -> PricingHint {
        PricingHint {
            price_per_second_cents: self.price_per_second_cents,
        }
    }
}

/// DTO for registering a route.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateModelRoute {
    pub identifier: String,
    pub display_name: String,
    pub provider: String,
    pub remote_model: String,
    pub remote_version: Option<String>,
    pub supports_webhook: Option<bool>,
    pub supports_cancel: Option<bool>,
    pub is_enabled: Option<bool>,
    pub price_per_second_cents: Option<f64>,
}

/// Provider-side metadata merged into a route by a schema refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteSchema {
    /// Replaces the stored schema when present.
    pub input_schema: Option<serde_json::Value>,
    /// Replaces the stored version when present.
    pub remote_version: Option<String>,
}
