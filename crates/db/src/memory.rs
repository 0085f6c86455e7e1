//! In-memory [`JobStore`] and [`RouteCatalog`].
//!
//! Used when no `DATABASE_URL` is configured and by tests. Every operation
//! takes one lock over the whole state, so the compare-and-swap in
//! [`JobStore::update_job_status`] and the media insert are atomic just as
//! they are inside a Postgres transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use prism_core::normalize::NormalizedMedia;
use prism_core::status::GenerationStatus;
use prism_core::types::{DbId, Timestamp};
use tokio::sync::RwLock;

use crate::catalog::RouteCatalog;
use crate::models::generation_job::{CreateGenerationJob, GenerationJob, StatusUpdate};
use crate::models::media_descriptor::MediaDescriptor;
use crate::models::model_route::{CreateModelRoute, ModelRoute, RouteSchema};
use crate::store::{JobStore, StoreError};

// ---------------------------------------------------------------------------
// Job store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct JobState {
    jobs: HashMap<DbId, GenerationJob>,
    media: Vec<MediaDescriptor>,
    next_job_id: DbId,
    next_media_id: DbId,
}

impl JobState {
    fn insert_media(&mut self, job_id: DbId, item: &NormalizedMedia) -> Option<MediaDescriptor> {
        let exists = self
            .media
            .iter()
            .any(|m| m.job_id == job_id && m.ordinal == item.ordinal);
        if exists {
            return None;
        }
        self.next_media_id += 1;
        let row = MediaDescriptor {
            id: self.next_media_id,
            job_id,
            ordinal: item.ordinal,
            url: item.url.clone(),
            kind: item.kind,
            created_at: Utc::now(),
        };
        self.media.push(row.clone());
        Some(row)
    }
}

/// [`JobStore`] holding everything in process memory.
#[derive(Default)]
pub struct MemoryJobStore {
    state: RwLock<JobState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn job_count(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    /// Overwrite a job's `updated_at`. Lets tests age a job without waiting.
    pub async fn set_updated_at(&self, id: DbId, updated_at: Timestamp) {
        if let Some(job) = self.state.write().await.jobs.get_mut(&id) {
            job.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError> {
        let mut state = self.state.write().await;
        state.next_job_id += 1;
        let now = Utc::now();
        let job = GenerationJob {
            id: state.next_job_id,
            external_id: None,
            model_identifier: input.model_identifier.clone(),
            provider: input.provider.clone(),
            input: input.input.clone(),
            status: GenerationStatus::Pending,
            output: None,
            error_message: None,
            requested_by: input.requested_by,
            project_id: input.project_id,
            field_id: input.field_id,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            predict_time_secs: None,
            cost_cents: None,
            created_at: now,
            updated_at: now,
            last_polled_at: None,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job_by_id(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(self.state.read().await.jobs.get(&id).cloned())
    }

    async fn get_job_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .jobs
            .values()
            .find(|job| job.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    async fn attach_external_id(
        &self,
        id: DbId,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, StoreError> {
        let mut state = self.state.write().await;

        let taken = state
            .jobs
            .values()
            .any(|job| job.id != id && job.external_id.as_deref() == Some(external_id));
        if taken {
            return Err(StoreError::Conflict(format!(
                "External id '{external_id}' is already attached to another job"
            )));
        }

        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.external_id.is_some() || job.is_terminal() {
            return Ok(None);
        }
        job.external_id = Some(external_id.to_string());
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn update_job_status(
        &self,
        id: DbId,
        expected: GenerationStatus,
        update: &StatusUpdate,
        media: &[NormalizedMedia],
    ) -> Result<Option<GenerationJob>, StoreError> {
        let mut state = self.state.write().await;

        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != expected {
            return Ok(None);
        }

        job.status = update.status;
        if update.output.is_some() {
            job.output = update.output.clone();
        }
        if update.error_message.is_some() {
            job.error_message = update.error_message.clone();
        }
        job.started_at = job.started_at.or(update.started_at);
        job.completed_at = job.completed_at.or(update.completed_at);
        job.predict_time_secs = update.predict_time_secs.or(job.predict_time_secs);
        job.cost_cents = update.cost_cents.or(job.cost_cents);
        job.updated_at = Utc::now();
        let updated = job.clone();

        for item in media {
            state.insert_media(id, item);
        }

        Ok(Some(updated))
    }

    async fn create_media_descriptors(
        &self,
        job_id: DbId,
        media: &[NormalizedMedia],
    ) -> Result<Vec<MediaDescriptor>, StoreError> {
        let mut state = self.state.write().await;
        Ok(media
            .iter()
            .filter_map(|item| state.insert_media(job_id, item))
            .collect())
    }

    async fn list_media(&self, job_id: DbId) -> Result<Vec<MediaDescriptor>, StoreError> {
        let state = self.state.read().await;
        let mut media: Vec<MediaDescriptor> = state
            .media
            .iter()
            .filter(|m| m.job_id == job_id)
            .cloned()
            .collect();
        media.sort_by_key(|m| m.ordinal);
        Ok(media)
    }

    async fn list_non_terminal_older_than(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        let state = self.state.read().await;
        let mut jobs: Vec<GenerationJob> = state
            .jobs
            .values()
            .filter(|job| !job.is_terminal() && job.updated_at < cutoff)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.updated_at);
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn list_due_for_poll(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        let state = self.state.read().await;
        let mut jobs: Vec<GenerationJob> = state
            .jobs
            .values()
            .filter(|job| {
                !job.is_terminal() && job.external_id.is_some() && last_touched(job) < cutoff
            })
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (last_touched(job), job.id));
        jobs.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(jobs)
    }

    async fn record_poll(&self, id: DbId) -> Result<(), StoreError> {
        if let Some(job) = self.state.write().await.jobs.get_mut(&id) {
            job.last_polled_at = Some(Utc::now());
        }
        Ok(())
    }
}

/// Later of the last change and the last poll.
fn last_touched(job: &GenerationJob) -> Timestamp {
    job.last_polled_at
        .map_or(job.updated_at, |polled| polled.max(job.updated_at))
}

// ---------------------------------------------------------------------------
// Route catalog
// ---------------------------------------------------------------------------

/// [`RouteCatalog`] holding routes in process memory.
#[derive(Default)]
pub struct MemoryRouteCatalog {
    routes: RwLock<Vec<ModelRoute>>,
}

impl MemoryRouteCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route. A later route with the same identifier overwrites
    /// its routing fields and keeps its id and refreshed schema.
    pub async fn insert(&self, input: CreateModelRoute) -> ModelRoute {
        let mut routes = self.routes.write().await;
        let now = Utc::now();
        let next_id = routes.iter().map(|r| r.id).max().unwrap_or(0) + 1;

        let existing = routes.iter().position(|r| r.identifier == input.identifier);
        let (id, input_schema, schema_refreshed_at, created_at) = match existing {
            Some(index) => {
                let old = routes.remove(index);
                (old.id, old.input_schema, old.schema_refreshed_at, old.created_at)
            }
            None => (next_id, None, None, now),
        };

        let route = ModelRoute {
            id,
            identifier: input.identifier,
            display_name: input.display_name,
            provider: input.provider,
            remote_model: input.remote_model,
            remote_version: input.remote_version,
            supports_webhook: input.supports_webhook.unwrap_or(true),
            supports_cancel: input.supports_cancel.unwrap_or(true),
            is_enabled: input.is_enabled.unwrap_or(true),
            price_per_second_cents: input.price_per_second_cents,
            input_schema,
            schema_refreshed_at,
            created_at,
            updated_at: now,
        };
        routes.push(route.clone());
        route
    }
}

#[async_trait]
impl RouteCatalog for MemoryRouteCatalog {
    async fn get_route_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<ModelRoute>, StoreError> {
        let routes = self.routes.read().await;
        Ok(routes.iter().find(|r| r.identifier == identifier).cloned())
    }

    async fn list_enabled_routes(&self) -> Result<Vec<ModelRoute>, StoreError> {
        let routes = self.routes.read().await;
        let mut enabled: Vec<ModelRoute> = routes.iter().filter(|r| r.is_enabled).cloned().collect();
        enabled.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(enabled)
    }

    async fn update_route_schema(
        &self,
        identifier: &str,
        schema: &RouteSchema,
    ) -> Result<Option<ModelRoute>, StoreError> {
        let mut routes = self.routes.write().await;
        let Some(route) = routes.iter_mut().find(|r| r.identifier == identifier) else {
            return Ok(None);
        };
        if schema.input_schema.is_some() {
            route.input_schema = schema.input_schema.clone();
        }
        if schema.remote_version.is_some() {
            route.remote_version = schema.remote_version.clone();
        }
        let now = Utc::now();
        route.schema_refreshed_at = Some(now);
        route.updated_at = now;
        Ok(Some(route.clone()))
    }

    async fn upsert_route(&self, input: &CreateModelRoute) -> Result<ModelRoute, StoreError> {
        Ok(self.insert(input.clone()).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
