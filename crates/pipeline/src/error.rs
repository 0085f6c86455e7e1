use prism_core::types::DbId;
use prism_db::StoreError;
use prism_providers::{ProviderError, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Generation job {0} not found")]
    JobNotFound(DbId),

    /// The request was rejected before reaching a provider.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Generation is already {status} and cannot be canceled")]
    NotCancelable { status: String },

    #[error("Webhook signature is invalid")]
    SignatureInvalid,

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Concurrent writers kept moving the job's status under us.
    #[error("Status of job {job_id} changed concurrently {attempts} times; giving up")]
    Contention { job_id: DbId, attempts: usize },
}
