//! The provider capability contract.

use async_trait::async_trait;
use prism_core::report::StatusReport;
use prism_db::models::model_route::{ModelRoute, RouteSchema};

use crate::error::ProviderError;

/// Per-submission options that are not part of the model input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Where the provider should push status notifications. `None` means
    /// the job is reconciled by polling only.
    pub callback_url: Option<String>,
    /// Ask the provider to stream output, when it supports streaming.
    pub stream: bool,
}

/// One remote inference provider.
///
/// Implementations translate the generic request into the provider's wire
/// format and back. All methods except the network calls are pure.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider name, matching `ModelRoute::provider`.
    fn name(&self) -> &str;

    /// Submit a prediction and return the provider's id for it.
    async fn submit(
        &self,
        route: &ModelRoute,
        input: &serde_json::Value,
        options: &SubmitOptions,
    ) -> Result<String, ProviderError>;

    /// Fetch the current status of a prediction. Side-effect free.
    async fn get_status(&self, external_id: &str) -> Result<StatusReport, ProviderError>;

    /// Ask the provider to cancel a prediction.
    ///
    /// Returns the provider's report for the canceled prediction, or
    /// [`ProviderError::NotCancelable`] when it had already finished.
    async fn cancel(&self, external_id: &str) -> Result<StatusReport, ProviderError>;

    /// Check a notification signature over the raw, unparsed body.
    fn validate_notification(&self, signature_header: &str, raw_body: &[u8]) -> bool;

    /// Parse a pushed notification body into a status report.
    fn parse_notification(&self, raw_body: &[u8]) -> Result<StatusReport, ProviderError>;

    /// Fetch provider-side model metadata for a schema refresh.
    async fn fetch_schema(&self, _route: &ModelRoute) -> Result<RouteSchema, ProviderError> {
        Err(ProviderError::Unsupported("fetch_schema"))
    }
}
