//! Background tasks.
//!
//! Each task is a long-running future intended to be spawned via
//! `tokio::spawn` and stopped through a [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use prism_pipeline::{GenerationService, Sweeper};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Spawn the generation sweeper, unless `interval_secs` is 0.
pub fn spawn_sweeper(
    service: Arc<GenerationService>,
    interval_secs: u64,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Generation sweeper disabled (POLL_INTERVAL_SECS=0)");
        return None;
    }

    let sweeper = Sweeper::new(service, Duration::from_secs(interval_secs));
    Some(tokio::spawn(async move {
        sweeper.run(cancel).await;
    }))
}
