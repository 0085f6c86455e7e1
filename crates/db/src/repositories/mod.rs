//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept a `&PgPool` (or any Postgres executor, for statements that
//! must share a transaction) as the first argument.

pub mod generation_job_repo;
pub mod media_descriptor_repo;
pub mod model_route_repo;

pub use generation_job_repo::GenerationJobRepo;
pub use media_descriptor_repo::MediaDescriptorRepo;
pub use model_route_repo::ModelRouteRepo;
