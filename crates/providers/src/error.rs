/// Errors from a provider adapter.
///
/// Adapter errors are returned to the immediate caller; the core never
/// retries them on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Transport, authentication, rate-limit or server-side failure.
    /// Retryable by the caller.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the input payload. The message is the
    /// provider's own, verbatim.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The prediction already reached a terminal status on the provider.
    #[error("Prediction is already {status} and cannot be canceled")]
    NotCancelable { status: String },

    /// The provider does not know the requested prediction or model.
    #[error("Not found on provider: {0}")]
    NotFound(String),

    /// The provider's response or notification could not be understood.
    #[error("Malformed provider payload: {0}")]
    Malformed(String),

    /// The adapter does not implement this capability.
    #[error("Operation not supported by this provider: {0}")]
    Unsupported(&'static str),
}

impl ProviderError {
    /// Whether repeating the same call later might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Unavailable(_))
    }
}
