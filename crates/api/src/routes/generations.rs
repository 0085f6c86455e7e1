//! Route definitions for the `/generations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// POST   /                -> submit_generation
/// GET    /stale           -> list_stale_generations
/// GET    /{id}            -> get_generation
/// DELETE /{id}            -> cancel_generation
/// POST   /{id}/cancel     -> cancel_generation
/// GET    /{id}/media      -> list_generation_media
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generations::submit_generation))
        .route("/stale", get(generations::list_stale_generations))
        .route(
            "/{id}",
            get(generations::get_generation).delete(generations::cancel_generation),
        )
        .route("/{id}/cancel", post(generations::cancel_generation))
        .route("/{id}/media", get(generations::list_generation_media))
}
