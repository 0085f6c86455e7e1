//! The job persistence seam used by the orchestration layer.
//!
//! [`JobStore`] is the complete set of reads and writes the lifecycle
//! manager and reconciliation paths need. Status writes are conditional
//! on the expected current status, which is what linearizes concurrent
//! notifications for the same job.

use async_trait::async_trait;
use prism_core::normalize::NormalizedMedia;
use prism_core::status::GenerationStatus;
use prism_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::generation_job::{CreateGenerationJob, GenerationJob, StatusUpdate};
use crate::models::media_descriptor::MediaDescriptor;
use crate::repositories::{GenerationJobRepo, MediaDescriptorRepo};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule was violated (e.g. a reused external id).
    #[error("Conflict: {0}")]
    Conflict(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job with no external id.
    async fn create_job(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError>;

    async fn get_job_by_id(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError>;

    async fn get_job_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, StoreError>;

    /// Attach the provider prediction id. Write-once: returns `None` when the
    /// job is missing, already has an id, or is already terminal. A duplicate
    /// id across jobs is a [`StoreError::Conflict`].
    async fn attach_external_id(
        &self,
        id: DbId,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, StoreError>;

    /// Atomically apply `update` if the job's status still equals `expected`,
    /// writing `media` in the same unit. Returns `None` on a lost race.
    async fn update_job_status(
        &self,
        id: DbId,
        expected: GenerationStatus,
        update: &StatusUpdate,
        media: &[NormalizedMedia],
    ) -> Result<Option<GenerationJob>, StoreError>;

    /// Insert descriptors for a job, skipping ordinals that already exist.
    ///
    /// Transitions do not call this. Their media are written only inside
    /// [`update_job_status`](Self::update_job_status), through the same
    /// idempotent insert.
    async fn create_media_descriptors(
        &self,
        job_id: DbId,
        media: &[NormalizedMedia],
    ) -> Result<Vec<MediaDescriptor>, StoreError>;

    async fn list_media(&self, job_id: DbId) -> Result<Vec<MediaDescriptor>, StoreError>;

    /// Non-terminal jobs last updated before `cutoff`, oldest first.
    async fn list_non_terminal_older_than(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, StoreError>;

    /// Non-terminal jobs with an external id whose last change and last
    /// poll are both before `cutoff`, least recently touched first.
    async fn list_due_for_poll(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, StoreError>;

    /// Record that a job was just polled. Leaves `updated_at` alone.
    async fn record_poll(&self, id: DbId) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// [`JobStore`] backed by the Postgres repositories.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a unique-constraint violation to [`StoreError::Conflict`].
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        // PostgreSQL unique constraint violation: error code 23505
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            return StoreError::Conflict(format!("Duplicate value violates {constraint}"));
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, input: &CreateGenerationJob) -> Result<GenerationJob, StoreError> {
        GenerationJobRepo::create(&self.pool, input)
            .await
            .map_err(classify)
    }

    async fn get_job_by_id(&self, id: DbId) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn get_job_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::find_by_external_id(&self.pool, external_id).await?)
    }

    async fn attach_external_id(
        &self,
        id: DbId,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, StoreError> {
        GenerationJobRepo::attach_external_id(&self.pool, id, external_id)
            .await
            .map_err(classify)
    }

    async fn update_job_status(
        &self,
        id: DbId,
        expected: GenerationStatus,
        update: &StatusUpdate,
        media: &[NormalizedMedia],
    ) -> Result<Option<GenerationJob>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(job) = GenerationJobRepo::update_status_if(&mut *tx, id, expected, update).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        for item in media {
            MediaDescriptorRepo::create(&mut *tx, id, item).await?;
        }

        tx.commit().await?;
        Ok(Some(job))
    }

    async fn create_media_descriptors(
        &self,
        job_id: DbId,
        media: &[NormalizedMedia],
    ) -> Result<Vec<MediaDescriptor>, StoreError> {
        let mut created = Vec::with_capacity(media.len());
        for item in media {
            if let Some(row) = MediaDescriptorRepo::create(&self.pool, job_id, item).await? {
                created.push(row);
            }
        }
        Ok(created)
    }

    async fn list_media(&self, job_id: DbId) -> Result<Vec<MediaDescriptor>, StoreError> {
        Ok(MediaDescriptorRepo::list_by_job(&self.pool, job_id).await?)
    }

    async fn list_non_terminal_older_than(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::list_non_terminal_older_than(&self.pool, cutoff, limit).await?)
    }

    async fn list_due_for_poll(
        &self,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, StoreError> {
        Ok(GenerationJobRepo::list_due_for_poll(&self.pool, cutoff, limit).await?)
    }

    async fn record_poll(&self, id: DbId) -> Result<(), StoreError> {
        Ok(GenerationJobRepo::record_poll(&self.pool, id).await?)
    }
}
