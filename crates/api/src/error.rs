use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use prism_core::error::CoreError;
use prism_db::StoreError;
use prism_pipeline::PipelineError;
use prism_providers::{ProviderError, RegistryError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for request-level domain errors and
/// [`PipelineError`] for orchestration failures. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pipeline(PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::JobNotFound(id) => AppError::Core(CoreError::NotFound {
                entity: "Generation job",
                id,
            }),
            PipelineError::Store(StoreError::Conflict(msg)) => {
                AppError::Core(CoreError::Conflict(msg))
            }
            other => AppError::Pipeline(other),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::Pipeline(PipelineError::Registry(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            },

            AppError::Pipeline(err) => classify_pipeline_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Log the detail and return a sanitized 500.
fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Map an orchestration error to an HTTP status, error code and message.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::Registry(registry) => match registry {
            RegistryError::ModelNotFound(_) => {
                (StatusCode::NOT_FOUND, "MODEL_NOT_FOUND", registry.to_string())
            }
            RegistryError::ModelDisabled(_) => {
                (StatusCode::CONFLICT, "MODEL_DISABLED", registry.to_string())
            }
            RegistryError::AdapterMissing { .. } => {
                tracing::error!(error = %registry, "Model route misconfigured");
                (StatusCode::NOT_FOUND, "MODEL_NOT_FOUND", registry.to_string())
            }
            RegistryError::Store(store) => classify_store_error(store),
            RegistryError::Provider(provider) => classify_provider_error(provider),
        },
        PipelineError::Provider(provider) => classify_provider_error(provider),
        PipelineError::Store(store) => classify_store_error(store),
        PipelineError::JobNotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Generation job with id {id} not found"),
        ),
        PipelineError::InvalidInput(msg) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT", msg.clone())
        }
        PipelineError::NotCancelable { .. } => {
            (StatusCode::CONFLICT, "NOT_CANCELABLE", err.to_string())
        }
        PipelineError::SignatureInvalid => {
            (StatusCode::UNAUTHORIZED, "SIGNATURE_INVALID", err.to_string())
        }
        PipelineError::UnknownProvider(_) => {
            (StatusCode::NOT_FOUND, "UNKNOWN_PROVIDER", err.to_string())
        }
        PipelineError::Contention { .. } => {
            (StatusCode::CONFLICT, "CONCURRENT_UPDATE", err.to_string())
        }
    }
}

fn classify_provider_error(err: &ProviderError) -> (StatusCode, &'static str, String) {
    match err {
        ProviderError::Unavailable(_) | ProviderError::Malformed(_) => {
            tracing::warn!(error = %err, "Provider call failed");
            (StatusCode::BAD_GATEWAY, "PROVIDER_UNAVAILABLE", err.to_string())
        }
        // Provider's own message, verbatim.
        ProviderError::InvalidInput(msg) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_INPUT", msg.clone())
        }
        ProviderError::NotCancelable { .. } => {
            (StatusCode::CONFLICT, "NOT_CANCELABLE", err.to_string())
        }
        ProviderError::NotFound(_) => {
            (StatusCode::BAD_GATEWAY, "PROVIDER_NOT_FOUND", err.to_string())
        }
        ProviderError::Unsupported(_) => {
            (StatusCode::BAD_REQUEST, "UNSUPPORTED", err.to_string())
        }
    }
}

/// Uniqueness conflicts map to 409; everything else is a sanitized 500.
fn classify_store_error(err: &StoreError) -> (StatusCode, &'static str, String) {
    match err {
        StoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        StoreError::Database(db) => internal(&db.to_string()),
    }
}
