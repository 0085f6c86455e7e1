//! Adapter for prediction-based inference APIs in the style of Replicate.
//!
//! A prediction is created with `POST /predictions` (pinned version) or
//! `POST /models/{owner}/{name}/predictions` (latest version), read back
//! with `GET /predictions/{id}` and canceled with
//! `POST /predictions/{id}/cancel`. The provider pushes the same prediction
//! object to the callback URL on every status change.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prism_core::report::{GenerationMetrics, StatusReport};
use prism_core::signature;
use prism_core::status::GenerationStatus;
use prism_db::models::model_route::{ModelRoute, RouteSchema};
use serde::Deserialize;

use crate::adapter::{ProviderAdapter, SubmitOptions};
use crate::error::ProviderError;

/// Provider name used in model routes and webhook paths.
pub const PROVIDER_NAME: &str = "replicate";

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.replicate.com/v1";

/// HTTP request timeout for a single provider call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Prediction events the provider should push to the callback URL.
const WEBHOOK_EVENTS: &[&str] = &["start", "output", "completed"];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    /// Base URL, e.g. `https://api.replicate.com/v1`.
    pub api_url: String,
    pub api_token: String,
    /// Secret used to sign pushed notifications. With an empty secret no
    /// notification verifies.
    pub webhook_secret: String,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// The prediction object returned by every endpoint and pushed to webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub metrics: Option<PredictionMetrics>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionMetrics {
    #[serde(default)]
    pub predict_time: Option<f64>,
}

/// Map the provider's status vocabulary onto [`GenerationStatus`].
///
/// `aborted` (terminated before it started) is treated as a cancellation.
pub fn map_status(status: &str) -> Option<GenerationStatus> {
    match status {
        "starting" => Some(GenerationStatus::Starting),
        "processing" => Some(GenerationStatus::Processing),
        "succeeded" => Some(GenerationStatus::Succeeded),
        "failed" => Some(GenerationStatus::Failed),
        "canceled" | "aborted" => Some(GenerationStatus::Canceled),
        _ => None,
    }
}

impl Prediction {
    /// Convert to the provider-agnostic report.
    pub fn into_report(self) -> Result<StatusReport, ProviderError> {
        let status = map_status(&self.status).ok_or_else(|| {
            ProviderError::Malformed(format!(
                "unknown prediction status '{}' for {}",
                self.status, self.id
            ))
        })?;

        let metrics = GenerationMetrics {
            predict_time_secs: self.metrics.and_then(|m| m.predict_time),
            started_at: self.started_at,
            completed_at: self.completed_at,
        };

        let error = self.error.and_then(|e| match e {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(StatusReport {
            external_id: self.id,
            status,
            output: self.output.filter(|o| !o.is_null()),
            error,
            metrics: (!metrics.is_empty()).then_some(metrics),
        })
    }
}

/// Parse a raw prediction body into a report.
pub fn parse_prediction(raw_body: &[u8]) -> Result<StatusReport, ProviderError> {
    let prediction: Prediction = serde_json::from_slice(raw_body)
        .map_err(|e| ProviderError::Malformed(format!("invalid prediction JSON: {e}")))?;
    prediction.into_report()
}

// ---------------------------------------------------------------------------
// Request building and error classification
// ---------------------------------------------------------------------------

/// Build the path (relative to the API URL) and JSON body for a submission.
pub fn build_submit_request(
    route: &ModelRoute,
    input: &serde_json::Value,
    options: &SubmitOptions,
) -> (String, serde_json::Value) {
    let mut body = serde_json::json!({ "input": input });

    if let Some(callback) = options.callback_url.as_ref().filter(|_| route.supports_webhook) {
        body["webhook"] = serde_json::json!(callback);
        body["webhook_events_filter"] = serde_json::json!(WEBHOOK_EVENTS);
    }
    if options.stream {
        body["stream"] = serde_json::json!(true);
    }

    match &route.remote_version {
        Some(version) => {
            body["version"] = serde_json::json!(version);
            ("/predictions".to_string(), body)
        }
        None => (format!("/models/{}/predictions", route.remote_model), body),
    }
}

/// Classify a non-2xx response.
///
/// 400 and 422 are input rejections and carry the provider's `detail`
/// verbatim; 404 is a missing model or prediction; everything else
/// (auth, rate limit, server errors) is unavailability.
pub fn classify_error(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    match status {
        400 | 422 => ProviderError::InvalidInput(detail),
        404 => ProviderError::NotFound(detail),
        401 | 403 => ProviderError::Unavailable(format!("authentication rejected ({status})")),
        _ => ProviderError::Unavailable(format!("HTTP {status}: {detail}")),
    }
}

/// Pull the input schema out of a model version object.
fn input_schema_of(version: &serde_json::Value) -> Option<serde_json::Value> {
    version
        .pointer("/openapi_schema/components/schemas/Input")
        .cloned()
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// HTTP adapter for the prediction API.
pub struct ReplicateAdapter {
    client: reqwest::Client,
    config: ReplicateConfig,
}

impl ReplicateAdapter {
    pub fn new(config: ReplicateConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("HTTP client setup failed: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    /// Create an adapter reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ReplicateConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(classify_error(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Malformed(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl ProviderAdapter for ReplicateAdapter {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn submit(
        &self,
        route: &ModelRoute,
        input: &serde_json::Value,
        options: &SubmitOptions,
    ) -> Result<String, ProviderError> {
        let (path, body) = build_submit_request(route, input, options);
        let prediction: Prediction = self
            .send_json(self.client.post(self.url(&path)).json(&body))
            .await?;

        tracing::debug!(
            external_id = %prediction.id,
            model = %route.identifier,
            status = %prediction.status,
            "Prediction created",
        );
        Ok(prediction.id)
    }

    async fn get_status(&self, external_id: &str) -> Result<StatusReport, ProviderError> {
        let prediction: Prediction = self
            .send_json(self.client.get(self.url(&format!("/predictions/{external_id}"))))
            .await?;
        prediction.into_report()
    }

    async fn cancel(&self, external_id: &str) -> Result<StatusReport, ProviderError> {
        let prediction: Prediction = self
            .send_json(
                self.client
                    .post(self.url(&format!("/predictions/{external_id}/cancel"))),
            )
            .await?;

        let status_name = prediction.status.clone();
        let report = prediction.into_report()?;
        match report.status {
            GenerationStatus::Canceled => Ok(report),
            status if status.is_terminal() => Err(ProviderError::NotCancelable {
                status: status_name,
            }),
            // Accepted but not yet settled; the provider finishes the
            // cancellation asynchronously.
            _ => Ok(StatusReport {
                status: GenerationStatus::Canceled,
                ..report
            }),
        }
    }

    fn validate_notification(&self, signature_header: &str, raw_body: &[u8]) -> bool {
        signature::verify_signature(&self.config.webhook_secret, signature_header, raw_body)
    }

    fn parse_notification(&self, raw_body: &[u8]) -> Result<StatusReport, ProviderError> {
        parse_prediction(raw_body)
    }

    async fn fetch_schema(&self, route: &ModelRoute) -> Result<RouteSchema, ProviderError> {
        let version: serde_json::Value = match &route.remote_version {
            Some(version) => {
                let path = format!("/models/{}/versions/{version}", route.remote_model);
                self.send_json(self.client.get(self.url(&path))).await?
            }
            None => {
                let path = format!("/models/{}", route.remote_model);
                let model: serde_json::Value =
                    self.send_json(self.client.get(self.url(&path))).await?;
                model
                    .get("latest_version")
                    .cloned()
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| {
                        ProviderError::Malformed(format!(
                            "model {} has no published version",
                            route.remote_model
                        ))
                    })?
            }
        };

        Ok(RouteSchema {
            input_schema: input_schema_of(&version),
            remote_version: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn route(version: Option<&str>, supports_webhook: bool) -> ModelRoute {
        let now = Utc::now();
        ModelRoute {
            id: 1,
            identifier: "flux".into(),
            display_name: "Flux".into(),
            provider: PROVIDER_NAME.into(),
            remote_model: "black-forest-labs/flux-schnell".into(),
            remote_version: version.map(str::to_string),
            supports_webhook,
            supports_cancel: true,
            is_enabled: true,
            price_per_second_cents: None,
            input_schema: None,
            schema_refreshed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    // -- Status vocabulary ----------------------------------------------------

    #[test]
    fn maps_provider_statuses() {
        assert_eq!(map_status("starting"), Some(GenerationStatus::Starting));
        assert_eq!(map_status("processing"), Some(GenerationStatus::Processing));
        assert_eq!(map_status("succeeded"), Some(GenerationStatus::Succeeded));
        assert_eq!(map_status("failed"), Some(GenerationStatus::Failed));
        assert_eq!(map_status("canceled"), Some(GenerationStatus::Canceled));
        assert_eq!(map_status("aborted"), Some(GenerationStatus::Canceled));
        assert_eq!(map_status("queued"), None);
    }

    // -- Prediction parsing ---------------------------------------------------

    #[test]
    fn parses_succeeded_prediction_with_metrics() {
        let body = json!({
            "id": "p-1",
            "status": "succeeded",
            "output": ["https://replicate.delivery/a.png"],
            "error": null,
            "metrics": { "predict_time": 2.5 },
            "started_at": "2026-03-01T10:00:00Z",
            "completed_at": "2026-03-01T10:00:03Z"
        });
        let report = parse_prediction(body.to_string().as_bytes()).unwrap();

        assert_eq!(report.external_id, "p-1");
        assert_eq!(report.status, GenerationStatus::Succeeded);
        assert!(report.output.is_some());
        assert!(report.error.is_none());
        let metrics = report.metrics.unwrap();
        assert_eq!(metrics.predict_time_secs, Some(2.5));
        assert!(metrics.started_at.is_some());
    }

    #[test]
    fn failed_prediction_keeps_error_text() {
        let body = json!({ "id": "p-2", "status": "failed", "error": "CUDA out of memory" });
        let report = parse_prediction(body.to_string().as_bytes()).unwrap();
        assert_eq!(report.status, GenerationStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("CUDA out of memory"));
        assert!(report.metrics.is_none());
    }

    #[test]
    fn structured_errors_are_stringified() {
        let body = json!({ "id": "p-3", "status": "failed", "error": { "code": 7 } });
        let report = parse_prediction(body.to_string().as_bytes()).unwrap();
        assert_eq!(report.error.as_deref(), Some(r#"{"code":7}"#));
    }

    #[test]
    fn null_output_is_absent() {
        let body = json!({ "id": "p-4", "status": "processing", "output": null });
        let report = parse_prediction(body.to_string().as_bytes()).unwrap();
        assert!(report.output.is_none());
    }

    #[test]
    fn unknown_status_or_bad_json_is_malformed() {
        let body = json!({ "id": "p-5", "status": "queued" });
        assert_matches!(
            parse_prediction(body.to_string().as_bytes()),
            Err(ProviderError::Malformed(_))
        );
        assert_matches!(parse_prediction(b"{not json"), Err(ProviderError::Malformed(_)));
    }

    // -- Submission -----------------------------------------------------------

    #[test]
    fn pinned_version_uses_predictions_endpoint() {
        let options = SubmitOptions::default();
        let (path, body) = build_submit_request(&route(Some("abc123"), true), &json!({"prompt": "x"}), &options);
        assert_eq!(path, "/predictions");
        assert_eq!(body["version"], "abc123");
        assert_eq!(body["input"]["prompt"], "x");
        assert!(body.get("webhook").is_none());
    }

    #[test]
    fn unpinned_route_uses_model_endpoint_with_webhook() {
        let options = SubmitOptions {
            callback_url: Some("https://app/api/v1/webhooks/replicate".into()),
            stream: true,
        };
        let (path, body) = build_submit_request(&route(None, true), &json!({}), &options);
        assert_eq!(path, "/models/black-forest-labs/flux-schnell/predictions");
        assert_eq!(body["webhook"], "https://app/api/v1/webhooks/replicate");
        assert_eq!(body["webhook_events_filter"], json!(["start", "output", "completed"]));
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn poll_only_routes_never_send_a_webhook() {
        let options = SubmitOptions {
            callback_url: Some("https://app/hook".into()),
            stream: false,
        };
        let (_, body) = build_submit_request(&route(None, false), &json!({}), &options);
        assert!(body.get("webhook").is_none());
    }

    // -- Error classification -------------------------------------------------

    #[test]
    fn input_rejections_surface_detail_verbatim() {
        let err = classify_error(422, r#"{"detail":"- input.width: must be <= 1440","status":422}"#);
        assert_eq!(
            err,
            ProviderError::InvalidInput("- input.width: must be <= 1440".into())
        );
    }

    #[test]
    fn auth_and_server_errors_are_unavailable() {
        assert_matches!(classify_error(401, "{}"), ProviderError::Unavailable(_));
        assert_matches!(classify_error(429, "slow down"), ProviderError::Unavailable(_));
        assert_matches!(classify_error(503, ""), ProviderError::Unavailable(_));
        assert_matches!(classify_error(404, "{}"), ProviderError::NotFound(_));
    }

    #[test]
    fn extracts_input_schema_from_version() {
        let version = json!({
            "id": "v1",
            "openapi_schema": { "components": { "schemas": { "Input": { "type": "object" } } } }
        });
        assert_eq!(input_schema_of(&version), Some(json!({ "type": "object" })));
        assert_eq!(input_schema_of(&json!({ "id": "v2" })), None);
    }

    // -- Notification validation -----------------------------------------------

    #[test]
    fn validates_signed_notifications() {
        let adapter = ReplicateAdapter::with_client(
            reqwest::Client::new(),
            ReplicateConfig {
                api_url: DEFAULT_API_URL.into(),
                api_token: "token".into(),
                webhook_secret: "secret".into(),
            },
        );
        let body = br#"{"id":"p-1","status":"succeeded"}"#;
        let sig = signature::sign_payload("secret", body);

        assert!(adapter.validate_notification(&sig, body));
        assert!(!adapter.validate_notification(&sig, br#"{"id":"p-1","status":"failed"}"#));
    }
}
