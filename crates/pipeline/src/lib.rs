//! Generation job orchestration.
//!
//! - [`JobLifecycleManager`] owns the status state machine. Its
//!   [`apply_status`](JobLifecycleManager::apply_status) is the single
//!   mutation entry point for every ingestion path.
//! - [`GenerationService`] submits, cancels and polls jobs.
//! - [`WebhookReceiver`] turns signed provider pushes into status reports.
//! - [`Sweeper`] optionally polls jobs whose notifications never arrived.

pub mod error;
pub mod lifecycle;
pub mod service;
pub mod sweeper;
pub mod webhook;

pub use error::PipelineError;
pub use lifecycle::{ApplyOutcome, AttachOutcome, JobLifecycleManager};
pub use service::{GenerationService, ServiceConfig, SubmitRequest};
pub use sweeper::Sweeper;
pub use webhook::{WebhookOutcome, WebhookReceiver};
