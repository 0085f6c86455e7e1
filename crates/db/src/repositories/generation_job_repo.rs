//! Repository for the `generation_jobs` table.

use prism_core::status::GenerationStatus;
use prism_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::generation_job::{CreateGenerationJob, GenerationJob, StatusUpdate};

/// Column list for `generation_jobs` queries.
const COLUMNS: &str = "\
    id, external_id, model_identifier, provider, input, status_id, \
    output, error_message, requested_by, project_id, field_id, \
    submitted_at, started_at, completed_at, predict_time_secs, cost_cents, \
    created_at, updated_at, last_polled_at";

/// Terminal status ids: succeeded, failed, canceled.
const TERMINAL_STATUSES: [i16; 3] = [
    GenerationStatus::Succeeded as i16,
    GenerationStatus::Failed as i16,
    GenerationStatus::Canceled as i16,
];

/// Provides persistence operations for generation jobs.
pub struct GenerationJobRepo;

impl GenerationJobRepo {
    /// Insert a new job in `pending` status with no external id.
    pub async fn create(
        pool: &PgPool,
        input: &CreateGenerationJob,
    ) -> Result<GenerationJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO generation_jobs \
                 (model_identifier, provider, input, status_id, requested_by, project_id, field_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(&input.model_identifier)
            .bind(&input.provider)
            .bind(&input.input)
            .bind(GenerationStatus::Pending.id())
            .bind(input.requested_by)
            .bind(input.project_id)
            .bind(input.field_id)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a job by the provider's prediction id.
    pub async fn find_by_external_id(
        pool: &PgPool,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generation_jobs WHERE external_id = $1");
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Attach the provider's prediction id. The id is write-once and only
    /// attaches to a non-terminal job: returns `None` if the job already has
    /// an id, has finished, or does not exist.
    pub async fn attach_external_id(
        pool: &PgPool,
        id: DbId,
        external_id: &str,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_jobs \
             SET external_id = $2, updated_at = NOW() \
             WHERE id = $1 AND external_id IS NULL \
               AND status_id NOT IN ($3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .bind(external_id)
            .bind(TERMINAL_STATUSES[0])
            .bind(TERMINAL_STATUSES[1])
            .bind(TERMINAL_STATUSES[2])
            .fetch_optional(pool)
            .await
    }

    /// Compare-and-swap the job status.
    ///
    /// The row is only written when its current status equals `expected`.
    /// Returns `None` when another writer got there first.
    pub async fn update_status_if<'e, E: PgExecutor<'e>>(
        executor: E,
        id: DbId,
        expected: GenerationStatus,
        update: &StatusUpdate,
    ) -> Result<Option<GenerationJob>, sqlx::Error> {
        let query = format!(
            "UPDATE generation_jobs SET \
                 status_id = $3, \
                 output = COALESCE($4, output), \
                 error_message = COALESCE($5, error_message), \
                 started_at = COALESCE(started_at, $6), \
                 completed_at = COALESCE(completed_at, $7), \
                 predict_time_secs = COALESCE($8, predict_time_secs), \
                 cost_cents = COALESCE($9, cost_cents), \
                 updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .bind(expected.id())
            .bind(update.status.id())
            .bind(&update.output)
            .bind(&update.error_message)
            .bind(update.started_at)
            .bind(update.completed_at)
            .bind(update.predict_time_secs)
            .bind(update.cost_cents)
            .fetch_optional(executor)
            .await
    }

    /// Non-terminal jobs whose last update is older than `cutoff`, oldest first.
    pub async fn list_non_terminal_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE status_id NOT IN ($1, $2, $3) AND updated_at < $4 \
             ORDER BY updated_at ASC \
             LIMIT $5"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(TERMINAL_STATUSES[0])
            .bind(TERMINAL_STATUSES[1])
            .bind(TERMINAL_STATUSES[2])
            .bind(cutoff)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Non-terminal jobs with a prediction id that have neither changed nor
    /// been polled since `cutoff`, least recently touched first.
    pub async fn list_due_for_poll(
        pool: &PgPool,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<GenerationJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generation_jobs \
             WHERE status_id NOT IN ($1, $2, $3) \
               AND external_id IS NOT NULL \
               AND GREATEST(updated_at, last_polled_at) < $4 \
             ORDER BY GREATEST(updated_at, last_polled_at) ASC, id ASC \
             LIMIT $5"
        );
        sqlx::query_as::<_, GenerationJob>(&query)
            .bind(TERMINAL_STATUSES[0])
            .bind(TERMINAL_STATUSES[1])
            .bind(TERMINAL_STATUSES[2])
            .bind(cutoff)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Stamp `last_polled_at` without touching `updated_at`.
    pub async fn record_poll(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE generation_jobs SET last_polled_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
