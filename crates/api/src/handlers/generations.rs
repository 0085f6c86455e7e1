//! Handlers for the `/generations` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use prism_core::error::CoreError;
use prism_core::types::DbId;
use prism_db::models::generation_job::StaleJobQuery;
use prism_pipeline::SubmitRequest;

use crate::error::{AppError, AppResult};
use crate::response::{no_cache_headers, DataResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/generations
///
/// Submit a generation request. Returns 201 with the created job, which
/// carries both the internal id and the provider's prediction id.
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(input): Json<SubmitRequest>,
) -> AppResult<impl IntoResponse> {
    if input.model.trim().is_empty() {
        return Err(AppError::BadRequest("model must not be empty".into()));
    }

    let job = state.service.submit(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/generations/{id}
///
/// Current state of a job. A non-terminal job is polled against its
/// provider first; poll failures fall back to the stored state.
pub async fn get_generation(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.service.get_with_poll(job_id).await?;
    Ok((no_cache_headers(), Json(DataResponse { data: job })))
}

/// GET /api/v1/generations/{id}/media
pub async fn list_generation_media(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let media = state.service.list_media(job_id).await?;
    Ok(Json(DataResponse { data: media }))
}

/// GET /api/v1/generations/stale
///
/// Non-terminal jobs untouched for longer than `older_than_secs`
/// (default `STALE_JOB_SECS`). Intended for an external monitor.
pub async fn list_stale_generations(
    State(state): State<AppState>,
    Query(params): Query<StaleJobQuery>,
) -> AppResult<impl IntoResponse> {
    if params.older_than_secs.is_some_and(|secs| secs < 0) {
        return Err(CoreError::Validation("older_than_secs must not be negative".into()).into());
    }
    let jobs = state.service.list_stale(&params).await?;
    Ok((no_cache_headers(), Json(DataResponse { data: jobs })))
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /api/v1/generations/{id}/cancel and DELETE /api/v1/generations/{id}
///
/// Returns the canceled job, or 409 `NOT_CANCELABLE` when it already
/// finished.
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state.service.cancel(job_id).await?;
    tracing::info!(job_id, "Generation canceled");
    Ok(Json(DataResponse { data: job }))
}
