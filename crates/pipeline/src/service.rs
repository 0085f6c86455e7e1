//! Submission, cancellation and on-demand polling of generation jobs.

use std::sync::Arc;

use chrono::Utc;
use prism_core::report::StatusReport;
use prism_core::status::GenerationStatus;
use prism_core::types::DbId;
use prism_db::models::generation_job::{CreateGenerationJob, GenerationJob, StaleJobQuery};
use prism_db::models::media_descriptor::MediaDescriptor;
use prism_events::TransitionSource;
use prism_providers::{ModelRegistry, ProviderError, ResolvedRoute, SubmitOptions};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::lifecycle::{ApplyOutcome, AttachOutcome, JobLifecycleManager};

/// Default page size for the stale-job listing.
const DEFAULT_STALE_LIMIT: i64 = 50;

/// Upper bound for the stale-job listing.
const MAX_STALE_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Externally reachable base URL for provider callbacks. `None` means
    /// every job is reconciled by polling.
    pub public_base_url: Option<String>,
    /// Age after which a non-terminal job is reported as stuck.
    pub stale_job_secs: i64,
}

/// A generation request as submitted by a caller.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Model identifier from the catalog.
    pub model: String,
    /// Model input. Must be a JSON object.
    pub input: serde_json::Value,
    pub requested_by: DbId,
    pub project_id: Option<DbId>,
    pub field_id: Option<DbId>,
    /// Overrides the callback URL derived from the public base URL.
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

pub struct GenerationService {
    registry: Arc<ModelRegistry>,
    lifecycle: Arc<JobLifecycleManager>,
    config: ServiceConfig,
}

impl GenerationService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        lifecycle: Arc<JobLifecycleManager>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            registry,
            lifecycle,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Arc<JobLifecycleManager> {
        &self.lifecycle
    }

    /// Callback URL for a provider, when a public base URL is configured.
    pub fn callback_url(&self, provider: &str) -> Option<String> {
        self.config.public_base_url.as_ref().map(|base| {
            format!("{}/api/v1/webhooks/{provider}", base.trim_end_matches('/'))
        })
    }

    // -----------------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------------

    /// Submit a request to the provider serving `request.model`.
    ///
    /// The model is resolved before any row is written, so an unknown or
    /// disabled model leaves no trace. When the provider rejects the
    /// submission the job is recorded as failed and the provider error is
    /// returned. When the job is canceled while the provider call is in
    /// flight, the new prediction is canceled remotely and the canceled job
    /// is returned.
    pub async fn submit(&self, request: SubmitRequest) -> Result<GenerationJob, PipelineError> {
        let resolved = self.registry.resolve(&request.model).await?;

        if !request.input.is_object() {
            return Err(PipelineError::InvalidInput(
                "input must be a JSON object".to_string(),
            ));
        }

        let job = self
            .lifecycle
            .create_job(&CreateGenerationJob {
                model_identifier: resolved.route.identifier.clone(),
                provider: resolved.route.provider.clone(),
                input: request.input.clone(),
                requested_by: request.requested_by,
                project_id: request.project_id,
                field_id: request.field_id,
            })
            .await?;

        let callback_url = if resolved.route.supports_webhook {
            request
                .webhook_url
                .clone()
                .or_else(|| self.callback_url(&resolved.route.provider))
        } else {
            None
        };
        let options = SubmitOptions {
            callback_url,
            stream: request.stream,
        };

        let external_id = match resolved
            .adapter
            .submit(&resolved.route, &request.input, &options)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(
                    job_id = job.id,
                    model = %resolved.route.identifier,
                    provider = %resolved.route.provider,
                    error = %e,
                    "Provider rejected submission",
                );
                self.record_submit_failure(job.id, &e).await;
                return Err(e.into());
            }
        };

        let job = match self.lifecycle.attach_external_id(job.id, &external_id).await? {
            AttachOutcome::Attached(job) => job,
            AttachOutcome::Finished(job) => {
                self.cancel_orphaned_prediction(&resolved, &job, &external_id)
                    .await;
                return Ok(job);
            }
        };
        tracing::info!(
            job_id = job.id,
            external_id = %external_id,
            model = %job.model_identifier,
            provider = %job.provider,
            webhook = options.callback_url.is_some(),
            "Generation submitted",
        );
        Ok(job)
    }

    /// Cancel a prediction whose local job finished before the provider
    /// accepted it. Nothing else would ever reconcile it.
    async fn cancel_orphaned_prediction(
        &self,
        resolved: &ResolvedRoute,
        job: &GenerationJob,
        external_id: &str,
    ) {
        tracing::info!(
            job_id = job.id,
            external_id,
            status = %job.status,
            "Job finished during submission; canceling provider prediction",
        );
        if !resolved.route.supports_cancel {
            tracing::warn!(
                job_id = job.id,
                external_id,
                model = %resolved.route.identifier,
                "Route does not support cancel; provider prediction left running",
            );
            return;
        }
        if let Err(e) = resolved.adapter.cancel(external_id).await {
            tracing::warn!(
                job_id = job.id,
                external_id,
                error = %e,
                "Failed to cancel orphaned provider prediction",
            );
        }
    }

    async fn record_submit_failure(&self, job_id: DbId, error: &ProviderError) {
        let report = StatusReport::new(String::new(), GenerationStatus::Failed)
            .with_error(error.to_string());
        if let Err(e) = self
            .lifecycle
            .apply_status(job_id, &report, TransitionSource::Submit)
            .await
        {
            tracing::error!(job_id, error = %e, "Failed to record submission failure");
        }
    }

    // -----------------------------------------------------------------------
    // Read and poll
    // -----------------------------------------------------------------------

    pub async fn get(&self, job_id: DbId) -> Result<GenerationJob, PipelineError> {
        self.lifecycle
            .store()
            .get_job_by_id(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))
    }

    /// Load a job, polling the provider first if it is not terminal.
    pub async fn get_with_poll(&self, job_id: DbId) -> Result<GenerationJob, PipelineError> {
        let job = self.get(job_id).await?;
        Ok(self.poll(job).await)
    }

    /// Reconcile one job against the provider.
    ///
    /// Returns the freshest persisted state. Provider and persistence
    /// failures are logged and leave the job as it was loaded.
    pub async fn poll(&self, job: GenerationJob) -> GenerationJob {
        if job.is_terminal() {
            return job;
        }
        let Some(external_id) = job.external_id.clone() else {
            return job;
        };
        let Some(adapter) = self.registry.adapter(&job.provider) else {
            tracing::warn!(job_id = job.id, provider = %job.provider, "No adapter to poll job");
            return job;
        };

        let report = match adapter.get_status(&external_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(
                    job_id = job.id,
                    external_id = %external_id,
                    error = %e,
                    "Status poll failed; returning last known state",
                );
                return job;
            }
        };

        match self
            .lifecycle
            .apply_status(job.id, &report, TransitionSource::Poll)
            .await
        {
            Ok(outcome) => outcome.into_job().unwrap_or(job),
            Err(e) => {
                tracing::error!(job_id = job.id, error = %e, "Applying polled status failed");
                job
            }
        }
    }

    pub async fn list_media(&self, job_id: DbId) -> Result<Vec<MediaDescriptor>, PipelineError> {
        let job = self.get(job_id).await?;
        Ok(self.lifecycle.store().list_media(job.id).await?)
    }

    /// Non-terminal jobs that have not changed for longer than the
    /// configured (or requested) threshold, oldest first.
    pub async fn list_stale(&self, query: &StaleJobQuery) -> Result<Vec<GenerationJob>, PipelineError> {
        let older_than = query
            .older_than_secs
            .unwrap_or(self.config.stale_job_secs)
            .max(0);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_STALE_LIMIT)
            .clamp(1, MAX_STALE_LIMIT);
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than);

        Ok(self
            .lifecycle
            .store()
            .list_non_terminal_older_than(cutoff, limit)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Cancel
    // -----------------------------------------------------------------------

    /// Cancel a job through its provider.
    ///
    /// A job the provider has not accepted yet is canceled locally. When
    /// the provider reports the prediction already finished, local state
    /// is left alone and [`PipelineError::NotCancelable`] is returned.
    pub async fn cancel(&self, job_id: DbId) -> Result<GenerationJob, PipelineError> {
        let job = self.get(job_id).await?;
        if job.is_terminal() {
            return Err(PipelineError::NotCancelable {
                status: job.status.to_string(),
            });
        }

        let report = match job.external_id.as_deref() {
            None => StatusReport::new(String::new(), GenerationStatus::Canceled),
            Some(external_id) => {
                let adapter = self
                    .registry
                    .adapter(&job.provider)
                    .ok_or_else(|| PipelineError::UnknownProvider(job.provider.clone()))?;

                if let Some(route) = self.registry.route(&job.model_identifier).await? {
                    if !route.supports_cancel {
                        return Err(ProviderError::Unsupported("cancel").into());
                    }
                }

                match adapter.cancel(external_id).await {
                    Ok(report) => report,
                    Err(ProviderError::NotCancelable { status }) => {
                        tracing::info!(job_id, external_id, %status, "Provider refused cancel");
                        return Err(PipelineError::NotCancelable { status });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let report = StatusReport {
            status: GenerationStatus::Canceled,
            output: None,
            ..report
        };

        match self
            .lifecycle
            .apply_status(job_id, &report, TransitionSource::Cancel)
            .await?
        {
            ApplyOutcome::Applied(job) | ApplyOutcome::Duplicate(job) => Ok(job),
            ApplyOutcome::Stale(job) => Err(PipelineError::NotCancelable {
                status: job.status.to_string(),
            }),
            ApplyOutcome::NotFound => Err(PipelineError::JobNotFound(job_id)),
        }
    }
}
