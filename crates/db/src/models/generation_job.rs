//! Generation job entity and DTOs.

use prism_core::report::GenerationMetrics;
use prism_core::status::GenerationStatus;
use prism_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `generation_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GenerationJob {
    pub id: DbId,
    /// Provider prediction id; `None` until the provider accepts the submission.
    pub external_id: Option<String>,
    pub model_identifier: String,
    pub provider: String,
    pub input: serde_json::Value,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: GenerationStatus,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub requested_by: DbId,
    pub project_id: Option<DbId>,
    pub field_id: Option<DbId>,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub predict_time_secs: Option<f64>,
    pub cost_cents: Option<i64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Last sweeper poll. Does not count as a change to the job.
    pub last_polled_at: Option<Timestamp>,
}

impl GenerationJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// DTO for inserting a new job in `pending` status.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGenerationJob {
    pub model_identifier: String,
    pub provider: String,
    pub input: serde_json::Value,
    pub requested_by: DbId,
    pub project_id: Option<DbId>,
    pub field_id: Option<DbId>,
}

/// Fields written by a single status transition.
///
/// `None` timestamps and metrics leave the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: GenerationStatus,
    pub output: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub predict_time_secs: Option<f64>,
    pub cost_cents: Option<i64>,
}

impl StatusUpdate {
    /// An update that only changes the status.
    pub fn status_only(status: GenerationStatus) -> Self {
        Self {
            status,
            output: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            predict_time_secs: None,
            cost_cents: None,
        }
    }

    /// Copy provider timing metrics onto the update.
    pub fn with_metrics(mut self, metrics: &GenerationMetrics) -> Self {
        self.started_at = metrics.started_at.or(self.started_at);
        self.completed_at = metrics.completed_at.or(self.completed_at);
        self.predict_time_secs = metrics.predict_time_secs.or(self.predict_time_secs);
        self
    }
}

/// Query parameters for listing stuck jobs.
#[derive(Debug, Deserialize)]
pub struct StaleJobQuery {
    /// Minimum age in seconds since the last update.
    pub older_than_secs: Option<i64>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
}
