//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server is
//! needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use prism_api::error::AppError;
use prism_core::error::CoreError;
use prism_db::StoreError;
use prism_pipeline::PipelineError;
use prism_providers::{ProviderError, RegistryError};

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Core and request errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_not_found_returns_404() {
    let (status, json) = error_to_response(PipelineError::JobNotFound(42).into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Generation job with id 42 not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("bad limit".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn store_conflict_returns_409() {
    let err: AppError = PipelineError::Store(StoreError::Conflict("dup".into())).into();
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Orchestration errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn provider_unavailable_returns_502() {
    let err: AppError = PipelineError::Provider(ProviderError::Unavailable("timeout".into())).into();
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "PROVIDER_UNAVAILABLE");
}

#[tokio::test]
async fn provider_input_rejection_is_surfaced_verbatim() {
    let err: AppError =
        PipelineError::Provider(ProviderError::InvalidInput("width must be <= 1440".into())).into();
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "INVALID_INPUT");
    assert_eq!(json["error"], "width must be <= 1440");
}

#[tokio::test]
async fn model_errors_map_to_404_and_409() {
    let (status, json) = error_to_response(RegistryError::ModelNotFound("x".into()).into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "MODEL_NOT_FOUND");

    let (status, json) = error_to_response(RegistryError::ModelDisabled("x".into()).into()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "MODEL_DISABLED");

    let missing = RegistryError::AdapterMissing {
        provider: "nowhere".into(),
        identifier: "x".into(),
    };
    let (status, _) = error_to_response(missing.into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn signature_failure_returns_401() {
    let (status, json) = error_to_response(PipelineError::SignatureInvalid.into()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "SIGNATURE_INVALID");
}

#[tokio::test]
async fn not_cancelable_returns_409() {
    let err: AppError = PipelineError::NotCancelable {
        status: "succeeded".into(),
    }
    .into();
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "NOT_CANCELABLE");
}
