//! Inbound provider notifications.
//!
//! A push is checked against the provider's signature over the raw body,
//! parsed into a status report and handed to the lifecycle manager. Every
//! outcome except a rejected signature (in strict mode) is acknowledged, so
//! providers do not retry pushes the service has already decided to drop.

use std::sync::Arc;

use prism_events::TransitionSource;
use prism_providers::ModelRegistry;
use serde::Serialize;

use crate::error::PipelineError;
use crate::lifecycle::{ApplyOutcome, JobLifecycleManager};

/// What became of an acknowledged notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    Duplicate,
    Stale,
    /// No adapter is registered under the path's provider name.
    UnknownProvider,
    /// No local job carries the notification's prediction id.
    UnknownJob,
    /// The body could not be parsed.
    Unparseable,
    /// Applying the report failed; the poller will catch up.
    Deferred,
}

impl From<&ApplyOutcome> for WebhookOutcome {
    fn from(outcome: &ApplyOutcome) -> Self {
        match outcome {
            ApplyOutcome::Applied(_) => WebhookOutcome::Applied,
            ApplyOutcome::Duplicate(_) => WebhookOutcome::Duplicate,
            ApplyOutcome::Stale(_) => WebhookOutcome::Stale,
            ApplyOutcome::NotFound => WebhookOutcome::UnknownJob,
        }
    }
}

pub struct WebhookReceiver {
    registry: Arc<ModelRegistry>,
    lifecycle: Arc<JobLifecycleManager>,
    strict_validation: bool,
}

impl WebhookReceiver {
    pub fn new(
        registry: Arc<ModelRegistry>,
        lifecycle: Arc<JobLifecycleManager>,
        strict_validation: bool,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            strict_validation,
        }
    }

    /// Ingest one push from `provider`.
    ///
    /// Fails only with [`PipelineError::SignatureInvalid`], and only when
    /// strict validation is on.
    pub async fn ingest(
        &self,
        provider: &str,
        signature_header: Option<&str>,
        raw_body: &[u8],
    ) -> Result<WebhookOutcome, PipelineError> {
        let Some(adapter) = self.registry.adapter(provider) else {
            tracing::warn!(
                provider,
                body_len = raw_body.len(),
                "Webhook for unregistered provider acknowledged",
            );
            return Ok(WebhookOutcome::UnknownProvider);
        };

        let signature = signature_header.unwrap_or_default();
        if !adapter.validate_notification(signature, raw_body) {
            if self.strict_validation {
                tracing::warn!(
                    provider,
                    has_signature = signature_header.is_some(),
                    body_len = raw_body.len(),
                    "Webhook signature rejected",
                );
                return Err(PipelineError::SignatureInvalid);
            }
            tracing::warn!(
                provider,
                has_signature = signature_header.is_some(),
                "Webhook signature invalid; accepting because strict validation is off",
            );
        }

        let report = match adapter.parse_notification(raw_body) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(provider, error = %e, "Unparseable webhook acknowledged");
                return Ok(WebhookOutcome::Unparseable);
            }
        };

        match self
            .lifecycle
            .apply_report(&report, TransitionSource::Webhook)
            .await
        {
            Ok(outcome) => {
                if matches!(outcome, ApplyOutcome::NotFound) {
                    tracing::info!(
                        provider,
                        external_id = %report.external_id,
                        status = %report.status,
                        "Webhook for unknown job acknowledged",
                    );
                }
                Ok(WebhookOutcome::from(&outcome))
            }
            Err(e) => {
                tracing::error!(
                    provider,
                    external_id = %report.external_id,
                    error = %e,
                    "Applying webhook report failed",
                );
                Ok(WebhookOutcome::Deferred)
            }
        }
    }
}
