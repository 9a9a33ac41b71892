//! Queue consumers.

use crate::orchestrator::JobOrchestrator;
use crate::queue::{BuildQueue, QueueError};
use dockhand_core::Job;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Back-off after the queue itself misbehaves.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Claims older than this are presumed abandoned by a crashed worker.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// What one pass of [`Worker::process_next`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// Nothing was pending.
    Idle,
    Completed(Uuid),
    /// The delivery was recorded as failed with this reason.
    Failed(Uuid, String),
}

/// A worker that claims and executes jobs, one at a time.
pub struct Worker {
    id: String,
    queue: Arc<dyn BuildQueue>,
    orchestrator: Arc<JobOrchestrator>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn BuildQueue>,
        orchestrator: Arc<JobOrchestrator>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            orchestrator,
            poll_interval,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Claim one delivery and run it to completion.
    pub async fn process_next(&self) -> Result<Processed, QueueError> {
        let Some(delivery) = self.queue.claim(&self.id).await? else {
            return Ok(Processed::Idle);
        };
        info!(
            worker_id = %self.id,
            delivery = %delivery.id,
            attempt = delivery.attempts,
            "Claimed job"
        );

        let job = match Job::from_payload(&delivery.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(delivery = %delivery.id, error = %e, "Rejecting malformed payload");
                let reason = e.to_string();
                self.queue.fail(delivery.id, &reason).await?;
                return Ok(Processed::Failed(delivery.id, reason));
            }
        };

        match self.orchestrator.perform(job).await {
            Ok(_) => {
                self.queue.complete(delivery.id).await?;
                Ok(Processed::Completed(delivery.id))
            }
            Err(e) => {
                let reason = e.to_string();
                self.queue.fail(delivery.id, &reason).await?;
                Ok(Processed::Failed(delivery.id, reason))
            }
        }
    }

    /// Process jobs until `shutdown` turns true. Shutdown is only observed between jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.id, queue = %self.queue.name(), "Starting worker");

        while !*shutdown.borrow() {
            let pause = match self.process_next().await {
                Ok(Processed::Idle) => self.poll_interval,
                Ok(_) => continue,
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Queue error");
                    ERROR_BACKOFF
                }
            };

            tokio::select! {
                _ = sleep(pause) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker_id = %self.id, "Worker stopped");
    }
}

/// A set of identical workers sharing one queue and one orchestrator.
pub struct WorkerPool {
    queue: Arc<dyn BuildQueue>,
    orchestrator: Arc<JobOrchestrator>,
    size: usize,
    poll_interval: Duration,
    stale_after: Duration,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn BuildQueue>,
        orchestrator: Arc<JobOrchestrator>,
        size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            size: size.max(1),
            poll_interval,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Release abandoned claims, then run every worker until shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        let released = self.queue.release_stale(self.stale_after).await?;
        if released > 0 {
            warn!(count = released, "Released stale claims for redelivery");
        }

        let pid = std::process::id();
        let mut workers = JoinSet::new();
        for n in 0..self.size {
            let worker = Worker::new(
                format!("worker-{pid}-{n}"),
                self.queue.clone(),
                self.orchestrator.clone(),
                self.poll_interval,
            );
            let shutdown = shutdown.clone();
            workers.spawn(async move { worker.run(shutdown).await });
        }

        info!(workers = self.size, "Worker pool started");
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker task ended abnormally");
            }
        }
        Ok(())
    }
}
