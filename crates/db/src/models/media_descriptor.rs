//! Media descriptors produced by succeeded generation jobs.

use prism_core::normalize::MediaKind;
use prism_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `media_descriptors` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MediaDescriptor {
    pub id: DbId,
    pub job_id: DbId,
    pub ordinal: i32,
    pub url: String,
    #[sqlx(try_from = "String")]
    pub kind: MediaKind,
    pub created_at: Timestamp,
}
