//! Request handlers.
//!
//! Handlers delegate to the orchestration layer in `prism_pipeline` and
//! map errors via [`AppError`](crate::error::AppError).

pub mod generations;
pub mod models;
pub mod webhooks;
