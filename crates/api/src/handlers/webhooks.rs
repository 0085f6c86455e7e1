//! Provider webhook ingestion.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use prism_pipeline::WebhookOutcome;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub outcome: WebhookOutcome,
}

/// POST /api/v1/webhooks/{provider}
///
/// The body is taken as raw bytes so the signature is checked over exactly
/// what the provider sent. Responds 200 for known and unknown jobs and
/// providers alike;
/// 401 only for a bad signature under strict validation.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.webhooks.ingest(&provider, signature, &body).await?;
    Ok(Json(DataResponse {
        data: WebhookAck { outcome },
    }))
}
