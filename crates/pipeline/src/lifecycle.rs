//! The job lifecycle state machine.
//!
//! Every status change, whether it arrives by webhook, by poll, from a
//! cancel request or from a failed submission, goes through
//! [`JobLifecycleManager::apply_status`]. The write is a compare-and-swap
//! on the status read just before it, so two reports for the same job
//! can never both advance it from the same state.

use std::sync::Arc;

use chrono::Utc;
use prism_core::cost::{CostModel, PricingHint};
use prism_core::normalize::{self, NormalizedMedia};
use prism_core::report::{GenerationMetrics, StatusReport};
use prism_core::status::{decide_transition, GenerationStatus, Transition};
use prism_core::types::DbId;
use prism_db::catalog::RouteCatalog;
use prism_db::models::generation_job::{CreateGenerationJob, GenerationJob, StatusUpdate};
use prism_db::store::{JobStore, StoreError};
use prism_events::{EventBus, GenerationEvent, TransitionSource};

use crate::error::PipelineError;

/// How many times a lost compare-and-swap is retried before giving up.
pub const MAX_CAS_ATTEMPTS: usize = 5;

pub const DEFAULT_FAILED_MESSAGE: &str = "Generation failed";
pub const DEFAULT_CANCELED_MESSAGE: &str = "Generation canceled";

/// Result of feeding one status report through the state machine.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The transition was written. Carries the updated job.
    Applied(GenerationJob),
    /// The job already holds this terminal status; nothing was written.
    Duplicate(GenerationJob),
    /// The report was behind the recorded status and was ignored.
    Stale(GenerationJob),
    /// No local job matches the report.
    NotFound,
}

impl ApplyOutcome {
    pub fn job(&self) -> Option<&GenerationJob> {
        match self {
            ApplyOutcome::Applied(job)
            | ApplyOutcome::Duplicate(job)
            | ApplyOutcome::Stale(job) => Some(job),
            ApplyOutcome::NotFound => None,
        }
    }

    pub fn into_job(self) -> Option<GenerationJob> {
        match self {
            ApplyOutcome::Applied(job)
            | ApplyOutcome::Duplicate(job)
            | ApplyOutcome::Stale(job) => Some(job),
            ApplyOutcome::NotFound => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied(_) => "applied",
            ApplyOutcome::Duplicate(_) => "duplicate",
            ApplyOutcome::Stale(_) => "stale",
            ApplyOutcome::NotFound => "not_found",
        }
    }
}

/// Result of recording a provider prediction id on a job.
#[derive(Debug, Clone)]
pub enum AttachOutcome {
    Attached(GenerationJob),
    /// The job reached a terminal status before the id arrived, e.g. it was
    /// canceled while the submission was in flight. The id was not stored.
    Finished(GenerationJob),
}

pub struct JobLifecycleManager {
    store: Arc<dyn JobStore>,
    catalog: Arc<dyn RouteCatalog>,
    cost_model: Arc<dyn CostModel>,
    events: Arc<EventBus>,
}

impl JobLifecycleManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        catalog: Arc<dyn RouteCatalog>,
        cost_model: Arc<dyn CostModel>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            catalog,
            cost_model,
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Insert a new `pending` job.
    pub async fn create_job(
        &self,
        input: &CreateGenerationJob,
    ) -> Result<GenerationJob, PipelineError> {
        let job = self.store.create_job(input).await?;
        tracing::debug!(job_id = job.id, model = %job.model_identifier, "Generation job created");
        Ok(job)
    }

    /// Record the provider's prediction id on a job. Write-once, and never
    /// on a job that has already finished.
    pub async fn attach_external_id(
        &self,
        job_id: DbId,
        external_id: &str,
    ) -> Result<AttachOutcome, PipelineError> {
        match self.store.attach_external_id(job_id, external_id).await? {
            Some(job) => Ok(AttachOutcome::Attached(job)),
            None => match self.store.get_job_by_id(job_id).await? {
                Some(job) if job.is_terminal() => Ok(AttachOutcome::Finished(job)),
                Some(job) => Err(StoreError::Conflict(format!(
                    "Job {} already has external id {}",
                    job.id,
                    job.external_id.as_deref().unwrap_or_default()
                ))
                .into()),
                None => Err(PipelineError::JobNotFound(job_id)),
            },
        }
    }

    /// Apply a report addressed by the provider's prediction id.
    pub async fn apply_report(
        &self,
        report: &StatusReport,
        source: TransitionSource,
    ) -> Result<ApplyOutcome, PipelineError> {
        match self.store.get_job_by_external_id(&report.external_id).await? {
            Some(job) => self.apply_status(job.id, report, source).await,
            None => Ok(ApplyOutcome::NotFound),
        }
    }

    /// Move a job to the reported status if the state machine allows it.
    ///
    /// Stale and duplicate reports are not errors. Only `report.status`,
    /// `output`, `error` and `metrics` are consulted; the job is addressed
    /// by `job_id`.
    pub async fn apply_status(
        &self,
        job_id: DbId,
        report: &StatusReport,
        source: TransitionSource,
    ) -> Result<ApplyOutcome, PipelineError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let Some(job) = self.store.get_job_by_id(job_id).await? else {
                return Ok(ApplyOutcome::NotFound);
            };

            match decide_transition(job.status, report.status) {
                Transition::Advance => {}
                Transition::Duplicate => {
                    tracing::debug!(
                        job_id,
                        status = %job.status,
                        source = source.as_str(),
                        "Duplicate terminal report ignored",
                    );
                    return Ok(ApplyOutcome::Duplicate(job));
                }
                Transition::Stale => {
                    tracing::debug!(
                        job_id,
                        current = %job.status,
                        requested = %report.status,
                        source = source.as_str(),
                        "Stale transition ignored",
                    );
                    return Ok(ApplyOutcome::Stale(job));
                }
            }

            let (update, media) = self.build_update(&job, report).await;
            let previous = job.status;

            match self
                .store
                .update_job_status(job_id, previous, &update, &media)
                .await?
            {
                Some(updated) => {
                    tracing::info!(
                        job_id,
                        external_id = updated.external_id.as_deref().unwrap_or_default(),
                        model = %updated.model_identifier,
                        from = %previous,
                        status = %updated.status,
                        media_count = media.len(),
                        source = source.as_str(),
                        "Status transition applied",
                    );
                    self.events.publish(
                        GenerationEvent::status_changed(
                            job_id,
                            updated.model_identifier.clone(),
                            previous,
                            updated.status,
                            source,
                        )
                        .with_external_id(updated.external_id.clone())
                        .with_media_count(media.len()),
                    );
                    return Ok(ApplyOutcome::Applied(updated));
                }
                None => {
                    tracing::debug!(job_id, attempt, "Status changed concurrently, retrying");
                }
            }
        }

        Err(PipelineError::Contention {
            job_id,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    /// Build the row update and media set for an advancing transition.
    async fn build_update(
        &self,
        job: &GenerationJob,
        report: &StatusReport,
    ) -> (StatusUpdate, Vec<NormalizedMedia>) {
        let now = Utc::now();
        let metrics = report.metrics.clone().unwrap_or_default();
        let mut update = StatusUpdate::status_only(report.status).with_metrics(&metrics);
        let mut media = Vec::new();

        match report.status {
            GenerationStatus::Pending | GenerationStatus::Starting => {}
            GenerationStatus::Processing => {
                update.started_at = update.started_at.or(Some(now));
            }
            GenerationStatus::Succeeded => {
                let output = report
                    .output
                    .clone()
                    .unwrap_or_else(|| serde_json::json!([]));
                media = normalize_or_empty(job, &output);
                update.output = Some(output);
            }
            GenerationStatus::Failed | GenerationStatus::Canceled => {
                update.error_message = Some(error_text(report));
            }
        }

        if report.status.is_terminal() {
            update.completed_at = update.completed_at.or(Some(now));
            update.cost_cents = self.attribute_cost(job, &metrics).await;
        }

        (update, media)
    }

    async fn attribute_cost(&self, job: &GenerationJob, metrics: &GenerationMetrics) -> Option<i64> {
        let pricing = match self.catalog.get_route_by_identifier(&job.model_identifier).await {
            Ok(Some(route)) => route.pricing(),
            Ok(None) => PricingHint::default(),
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "Route lookup for pricing failed");
                PricingHint::default()
            }
        };
        self.cost_model.cost_cents(&pricing, metrics)
    }
}

/// Normalize a success payload. A payload of no recognizable shape still
/// lets the job succeed, with no media.
fn normalize_or_empty(job: &GenerationJob, output: &serde_json::Value) -> Vec<NormalizedMedia> {
    match normalize::normalize_output(output, &job.input) {
        Ok(media) => media,
        Err(e) => {
            tracing::warn!(
                job_id = job.id,
                model = %job.model_identifier,
                error = %e,
                "Output normalization failed; recording success without media",
            );
            Vec::new()
        }
    }
}

/// Error text for a failed or canceled job. Never empty.
fn error_text(report: &StatusReport) -> String {
    match report.error.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ if report.status == GenerationStatus::Canceled => DEFAULT_CANCELED_MESSAGE.to_string(),
        _ => DEFAULT_FAILED_MESSAGE.to_string(),
    }
}
