//! In-process queue for tests of the worker and the HTTP layer.

use crate::queue::{
    BuildQueue, QueueError, QueueStats, QueuedJob, STATUS_CLAIMED, STATUS_COMPLETED,
    STATUS_FAILED, STATUS_PENDING,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// A [`BuildQueue`] that lives and dies with the process.
pub struct MemoryQueue {
    name: String,
    jobs: Mutex<Vec<QueuedJob>>,
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every delivery, in enqueue order.
    pub fn jobs(&self) -> Vec<QueuedJob> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<QueuedJob>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finish(&self, id: Uuid, status: &str, error: Option<&str>) -> Result<(), QueueError> {
        let mut jobs = self.lock();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(QueueError::NotFound(id))?;
        job.status = status.to_string();
        job.error = error.map(String::from);
        job.finished_at = Some(Utc::now());
        Ok(())
    }

    fn with_status(&self, status: &str) -> impl Iterator<Item = QueuedJob> {
        self.lock()
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }
}

#[async_trait]
impl BuildQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue_payload(&self, payload: serde_json::Value) -> Result<QueuedJob, QueueError> {
        let job = QueuedJob::new(&self.name, payload);
        self.lock().push(job.clone());
        Ok(job)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let mut jobs = self.lock();
        let Some(job) = jobs.iter_mut().find(|j| j.status == STATUS_PENDING) else {
            return Ok(None);
        };
        job.status = STATUS_CLAIMED.to_string();
        job.claimed_by = Some(worker_id.to_string());
        job.claimed_at = Some(Utc::now());
        job.attempts += 1;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        self.finish(id, STATUS_COMPLETED, None)
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        self.finish(id, STATUS_FAILED, Some(error))
    }

    async fn release_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut released = 0;
        for job in self.lock().iter_mut() {
            let stale = job.status == STATUS_CLAIMED
                && job.claimed_at.is_some_and(|claimed| claimed <= cutoff);
            if stale {
                job.status = STATUS_PENDING.to_string();
                job.claimed_by = None;
                job.claimed_at = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let mut stats = QueueStats::default();
        for job in self.lock().iter() {
            match job.status.as_str() {
                STATUS_PENDING => stats.pending += 1,
                STATUS_CLAIMED => stats.working += 1,
                STATUS_COMPLETED => stats.completed += 1,
                STATUS_FAILED => stats.failed += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn peek(&self, limit: i64) -> Result<Vec<QueuedJob>, QueueError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self.with_status(STATUS_PENDING).take(limit).collect())
    }

    async fn failures(&self, limit: i64) -> Result<Vec<QueuedJob>, QueueError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut failed: Vec<QueuedJob> = self.with_status(STATUS_FAILED).collect();
        failed.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        failed.truncate(limit);
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_core::Job;

    #[tokio::test]
    async fn test_claims_in_fifo_order() {
        let queue = MemoryQueue::new("builds");
        let first = queue.enqueue(&Job::new("acme", "api", "main")).await.unwrap();
        let second = queue.enqueue(&Job::new("acme", "web", "main")).await.unwrap();

        let claimed = queue.claim("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.claimed_by.as_deref(), Some("w1"));
        assert_eq!(claimed.attempts, 1);
        assert_eq!(queue.claim("w2").await.unwrap().unwrap().id, second.id);
        assert!(queue.claim("w3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats_and_listings() {
        let queue = MemoryQueue::new("builds");
        for name in ["a", "b", "c", "d"] {
            queue.enqueue(&Job::new("acme", name, "main")).await.unwrap();
        }
        let done = queue.claim("w").await.unwrap().unwrap();
        let broken = queue.claim("w").await.unwrap().unwrap();
        queue.claim("w").await.unwrap();
        queue.complete(done.id).await.unwrap();
        queue.fail(broken.id, "fetch failed: boom").await.unwrap();

        assert_eq!(
            queue.stats().await.unwrap(),
            QueueStats {
                pending: 1,
                working: 1,
                completed: 1,
                failed: 1,
            }
        );
        assert_eq!(queue.peek(10).await.unwrap().len(), 1);
        let failures = queue.failures(10).await.unwrap();
        assert_eq!(failures[0].id, broken.id);
        assert_eq!(failures[0].error.as_deref(), Some("fetch failed: boom"));
    }

    #[tokio::test]
    async fn test_release_stale_claims() {
        let queue = MemoryQueue::new("builds");
        queue.enqueue(&Job::new("acme", "api", "main")).await.unwrap();
        queue.claim("w1").await.unwrap();

        assert_eq!(queue.release_stale(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(queue.release_stale(Duration::ZERO).await.unwrap(), 1);

        let again = queue.claim("w2").await.unwrap().unwrap();
        assert_eq!(again.attempts, 2);
    }

    #[tokio::test]
    async fn test_finishing_unknown_job() {
        let queue = MemoryQueue::new("builds");
        let err = queue.complete(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_peek_respects_limit() {
        let queue = MemoryQueue::new("builds");
        for name in ["a", "b", "c"] {
            queue.enqueue(&Job::new("acme", name, "main")).await.unwrap();
        }
        assert_eq!(queue.peek(2).await.unwrap().len(), 2);
        assert!(queue.peek(-1).await.unwrap().is_empty());
    }
}
