//! Provider-agnostic status reports.
//!
//! Both reconciliation paths (webhook push and status poll) produce a
//! [`StatusReport`], which is the only input the lifecycle manager accepts.

use serde::{Deserialize, Serialize};

use crate::status::GenerationStatus;
use crate::types::Timestamp;

/// Timing information reported by a provider for one prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    /// Seconds the provider spent running the model.
    pub predict_time_secs: Option<f64>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl GenerationMetrics {
    pub fn is_empty(&self) -> bool {
        self.predict_time_secs.is_none() && self.started_at.is_none() && self.completed_at.is_none()
    }
}

/// A status observation for one provider prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Provider-assigned prediction id.
    pub external_id: String,
    pub status: GenerationStatus,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub metrics: Option<GenerationMetrics>,
}

impl StatusReport {
    /// A bare report carrying only a status.
    pub fn new(external_id: impl Into<String>, status: GenerationStatus) -> Self {
        Self {
            external_id: external_id.into(),
            status,
            output: None,
            error: None,
            metrics: None,
        }
    }

    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_metrics(mut self, metrics: GenerationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
