//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the lifecycle manager
//! (the only publisher) and any number of subscribers.

use chrono::{DateTime, Utc};
use prism_core::status::GenerationStatus;
use prism_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event name for an applied status transition.
pub const STATUS_CHANGED: &str = "generation.status_changed";

// ---------------------------------------------------------------------------
// GenerationEvent
// ---------------------------------------------------------------------------

/// Which ingestion path produced a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionSource {
    Submit,
    Webhook,
    Poll,
    Cancel,
}

impl TransitionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionSource::Submit => "submit",
            TransitionSource::Webhook => "webhook",
            TransitionSource::Poll => "poll",
            TransitionSource::Cancel => "cancel",
        }
    }
}

/// A status transition that was durably recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationEvent {
    /// Dot-separated event name, e.g. `"generation.status_changed"`.
    pub event_type: String,
    pub job_id: DbId,
    pub external_id: Option<String>,
    pub model_identifier: String,
    pub previous_status: GenerationStatus,
    pub status: GenerationStatus,
    pub source: TransitionSource,
    /// Number of media descriptors written with this transition.
    pub media_count: usize,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl GenerationEvent {
    pub fn status_changed(
        job_id: DbId,
        model_identifier: impl Into<String>,
        previous_status: GenerationStatus,
        status: GenerationStatus,
        source: TransitionSource,
    ) -> Self {
        Self {
            event_type: STATUS_CHANGED.to_string(),
            job_id,
            external_id: None,
            model_identifier: model_identifier.into(),
            previous_status,
            status,
            source,
            media_count: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_external_id(mut self, external_id: Option<String>) -> Self {
        self.external_id = external_id;
        self
    }

    pub fn with_media_count(mut self, media_count: usize) -> Self {
        self.media_count = media_count;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<GenerationEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: GenerationEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
