//! Repository for the `media_descriptors` table.

use prism_core::normalize::NormalizedMedia;
use prism_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::media_descriptor::MediaDescriptor;

/// Column list for `media_descriptors` queries.
const COLUMNS: &str = "id, job_id, ordinal, url, kind, created_at";

/// Provides persistence operations for media descriptors.
pub struct MediaDescriptorRepo;

impl MediaDescriptorRepo {
    /// Insert one descriptor. A second insert for the same `(job_id, ordinal)`
    /// is ignored and returns `None`.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        job_id: DbId,
        media: &NormalizedMedia,
    ) -> Result<Option<MediaDescriptor>, sqlx::Error> {
        let query = format!(
            "INSERT INTO media_descriptors (job_id, ordinal, url, kind) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_media_descriptors_job_ordinal DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MediaDescriptor>(&query)
            .bind(job_id)
            .bind(media.ordinal)
            .bind(&media.url)
            .bind(media.kind.as_str())
            .fetch_optional(executor)
            .await
    }

    /// List a job's descriptors in output order.
    pub async fn list_by_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<MediaDescriptor>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM media_descriptors WHERE job_id = $1 ORDER BY ordinal ASC"
        );
        sqlx::query_as::<_, MediaDescriptor>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
