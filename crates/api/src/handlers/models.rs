//! Handlers for the `/models` resource.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/models
///
/// Enabled model routes, ordered by identifier.
pub async fn list_models(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let routes = state.registry.list_enabled().await?;
    Ok(Json(DataResponse { data: routes }))
}

/// POST /api/v1/models/{identifier}/refresh-schema
///
/// Re-fetch provider-side metadata for a route. In-flight jobs are not
/// affected.
pub async fn refresh_model_schema(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<impl IntoResponse> {
    let route = state.registry.refresh_schema(&identifier).await?;
    Ok(Json(DataResponse { data: route }))
}
