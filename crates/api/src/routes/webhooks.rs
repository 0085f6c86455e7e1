//! Inbound provider notifications. Unauthenticated; requests are
//! verified by signature instead.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /{provider}      -> receive_webhook
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{provider}", post(webhooks::receive_webhook))
}
