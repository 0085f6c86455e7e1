//! Background subscriber that logs every generation event.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::bus::GenerationEvent;

/// Writes each [`GenerationEvent`] to the tracing log at info level.
pub struct EventLogger;

impl EventLogger {
    /// Consume events until the bus is dropped.
    pub async fn run(mut receiver: broadcast::Receiver<GenerationEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::info!(
                        event_type = %event.event_type,
                        job_id = event.job_id,
                        external_id = event.external_id.as_deref().unwrap_or(""),
                        model = %event.model_identifier,
                        from = %event.previous_status,
                        to = %event.status,
                        source = event.source.as_str(),
                        media_count = event.media_count,
                        "Generation status changed",
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event logger lagged behind the bus");
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Event bus closed, event logger stopping");
                    break;
                }
            }
        }
    }
}
