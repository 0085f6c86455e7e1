//! Provider adapters and the model registry.
//!
//! Every remote inference provider is reached through one
//! [`ProviderAdapter`] implementation. The [`ModelRegistry`] maps a model
//! identifier to its stored route and the adapter that serves it.

pub mod adapter;
pub mod error;
pub mod mock;
pub mod registry;
pub mod replicate;

pub use adapter::{ProviderAdapter, SubmitOptions};
pub use error::ProviderError;
pub use mock::MockAdapter;
pub use registry::{ModelRegistry, RegistryError, ResolvedRoute};
pub use replicate::{ReplicateAdapter, ReplicateConfig};
