//! In-process scripted provider.
//!
//! Used by the test suites and, behind `ENABLE_MOCK_PROVIDER`, by local
//! development without provider credentials. Predictions start out
//! `starting`; tests drive them forward with [`MockAdapter::set_report`].
//! Notifications use the same prediction wire format as the Replicate
//! adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use prism_core::report::StatusReport;
use prism_core::signature;
use prism_core::status::GenerationStatus;
use prism_db::models::model_route::{ModelRoute, RouteSchema};
use tokio::sync::Notify;

use crate::adapter::{ProviderAdapter, SubmitOptions};
use crate::error::ProviderError;
use crate::replicate;

/// Provider name routes use to select the mock adapter.
pub const PROVIDER_NAME: &str = "mock";

/// A submission as the mock provider received it.
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub external_id: String,
    pub model_identifier: String,
    pub input: serde_json::Value,
    pub options: SubmitOptions,
}

/// Pauses one `submit` call after it is entered and before it returns.
#[derive(Clone, Default)]
pub struct SubmitHold {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl SubmitHold {
    /// Wait until the held `submit` has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held `submit` finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct MockState {
    reports: HashMap<String, StatusReport>,
    submissions: Vec<MockSubmission>,
    next_submit_error: Option<ProviderError>,
    next_submit_hold: Option<SubmitHold>,
    schema: Option<RouteSchema>,
}

/// Scripted [`ProviderAdapter`].
pub struct MockAdapter {
    webhook_secret: String,
    next_id: AtomicU64,
    status_calls: AtomicU64,
    state: Mutex<MockState>,
}

impl MockAdapter {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            next_id: AtomicU64::new(1),
            status_calls: AtomicU64::new(0),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Replace the provider-side state of a prediction.
    pub fn set_report(&self, report: StatusReport) {
        self.state
            .lock()
            .reports
            .insert(report.external_id.clone(), report);
    }

    /// Make the next `submit` call fail with `error`.
    pub fn fail_next_submit(&self, error: ProviderError) {
        self.state.lock().next_submit_error = Some(error);
    }

    /// Pause the next `submit` call until the returned hold is released.
    pub fn hold_next_submit(&self) -> SubmitHold {
        let hold = SubmitHold::default();
        self.state.lock().next_submit_hold = Some(hold.clone());
        hold
    }

    /// Metadata returned by `fetch_schema`. Unset means unsupported.
    pub fn set_schema(&self, schema: RouteSchema) {
        self.state.lock().schema = Some(schema);
    }

    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.state.lock().submissions.clone()
    }

    /// Number of `get_status` calls served so far.
    pub fn status_calls(&self) -> u64 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Sign a body the way the mock provider signs its notifications.
    pub fn sign(&self, raw_body: &[u8]) -> String {
        signature::sign_payload(&self.webhook_secret, raw_body)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn submit(
        &self,
        route: &ModelRoute,
        input: &serde_json::Value,
        options: &SubmitOptions,
    ) -> Result<String, ProviderError> {
        let hold = self.state.lock().next_submit_hold.take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }

        let mut state = self.state.lock();
        if let Some(err) = state.next_submit_error.take() {
            return Err(err);
        }

        let external_id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        state.reports.insert(
            external_id.clone(),
            StatusReport::new(external_id.clone(), GenerationStatus::Starting),
        );
        state.submissions.push(MockSubmission {
            external_id: external_id.clone(),
            model_identifier: route.identifier.clone(),
            input: input.clone(),
            options: options.clone(),
        });
        Ok(external_id)
    }

    async fn get_status(&self, external_id: &str) -> Result<StatusReport, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .reports
            .get(external_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("prediction {external_id}")))
    }

    async fn cancel(&self, external_id: &str) -> Result<StatusReport, ProviderError> {
        let mut state = self.state.lock();
        let report = state
            .reports
            .get_mut(external_id)
            .ok_or_else(|| ProviderError::NotFound(format!("prediction {external_id}")))?;

        match report.status {
            GenerationStatus::Canceled => {}
            status if status.is_terminal() => {
                return Err(ProviderError::NotCancelable {
                    status: status.as_str().to_string(),
                });
            }
            _ => {
                report.status = GenerationStatus::Canceled;
                report.output = None;
            }
        }
        Ok(report.clone())
    }

    fn validate_notification(&self, signature_header: &str, raw_body: &[u8]) -> bool {
        signature::verify_signature(&self.webhook_secret, signature_header, raw_body)
    }

    fn parse_notification(&self, raw_body: &[u8]) -> Result<StatusReport, ProviderError> {
        replicate::parse_prediction(raw_body)
    }

    async fn fetch_schema(&self, _route: &ModelRoute) -> Result<RouteSchema, ProviderError> {
        self.state
            .lock()
            .schema
            .clone()
            .ok_or(ProviderError::Unsupported("fetch_schema"))
    }
}
