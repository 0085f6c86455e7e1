//! Periodic reconciliation of jobs whose notifications never arrived.
//!
//! Each tick polls non-terminal jobs that have neither changed nor been
//! polled for at least one interval, through the same path a status-check
//! request uses. Every polled job is stamped, so jobs the provider keeps
//! reporting unchanged move behind the rest of the queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::service::GenerationService;

/// Jobs polled per tick.
pub const SWEEP_BATCH: i64 = 50;

pub struct Sweeper {
    service: Arc<GenerationService>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(service: Arc<GenerationService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Run until `cancel` is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        tracing::info!(interval_secs = self.interval.as_secs(), "Generation sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Generation sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let polled = self.sweep_once().await;
                    if polled > 0 {
                        tracing::debug!(polled, "Sweep cycle finished");
                    }
                }
            }
        }
    }

    /// Poll one batch of quiet jobs. Returns how many were polled.
    pub async fn sweep_once(&self) -> usize {
        let grace = chrono::Duration::from_std(self.interval)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let cutoff = Utc::now() - grace;

        let store = self.service.lifecycle().store();
        let jobs = match store.list_due_for_poll(cutoff, SWEEP_BATCH).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Sweep query failed");
                return 0;
            }
        };

        let count = jobs.len();
        for job in jobs {
            let job_id = job.id;
            self.service.poll(job).await;
            if let Err(e) = store.record_poll(job_id).await {
                tracing::error!(job_id, error = %e, "Failed to record sweep poll");
            }
        }
        count
    }
}
