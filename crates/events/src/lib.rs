//! Generation status events.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`GenerationEvent`]: emitted once per applied status transition.
//! - [`EventLogger`]: background subscriber that writes every event to
//!   the tracing log.

pub mod bus;
pub mod logger;

pub use bus::{EventBus, GenerationEvent, TransitionSource};
pub use logger::EventLogger;
