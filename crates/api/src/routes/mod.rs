pub mod generations;
pub mod health;
pub mod models;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Caller-facing part of the `/api/v1` tree. Browsers reach these, so
/// they sit behind CORS.
///
/// ```text
/// /generations                          submit (POST)
/// /generations/stale                    stuck non-terminal jobs
/// /generations/{id}                     status check (polls), cancel (DELETE)
/// /generations/{id}/cancel              cancel (POST)
/// /generations/{id}/media               normalized media
///
/// /models                               enabled model routes
/// /models/{identifier}/refresh-schema   refresh provider metadata (POST)
/// ```
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generations::router())
        .nest("/models", models::router())
}

/// Provider-facing part of the `/api/v1` tree: server-to-server pushes,
/// verified by signature.
///
/// ```text
/// /webhooks/{provider}                  provider status push (POST)
/// ```
pub fn provider_routes() -> Router<AppState> {
    Router::new().nest("/webhooks", webhooks::router())
}
