use axum::routing::{get, post};
use axum::Router;

use crate::handlers::models;
use crate::state::AppState;

/// Routes mounted at `/models`.
///
/// ```text
/// GET    /                                -> list_models
/// POST   /{identifier}/refresh-schema     -> refresh_model_schema
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(models::list_models))
        .route("/{identifier}/refresh-schema", post(models::refresh_model_schema))
}
