//! Job queue: the trait the harness and the HTTP layer share, and its PostgreSQL backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dockhand_core::Job;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CLAIMED: &str = "claimed";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// A delivery on the queue.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueuedJob {
    pub id: Uuid,
    pub queue: String,
    /// Raw payload; decoded into a [`Job`] only when claimed.
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl QueuedJob {
    pub fn new(queue: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            queue: queue.into(),
            payload,
            status: STATUS_PENDING.to_string(),
            attempts: 0,
            claimed_by: None,
            claimed_at: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Queue sizes by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    /// Claimed and not yet finished.
    pub working: i64,
    pub completed: i64,
    pub failed: i64,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("queued job not found: {0}")]
    NotFound(Uuid),
}

/// At-least-once job queue.
#[async_trait]
pub trait BuildQueue: Send + Sync {
    /// Name of the queue deliveries are added to and claimed from.
    fn name(&self) -> &str;

    /// Add a raw payload.
    async fn enqueue_payload(&self, payload: serde_json::Value) -> Result<QueuedJob, QueueError>;

    async fn enqueue(&self, job: &Job) -> Result<QueuedJob, QueueError> {
        self.enqueue_payload(job.to_payload()).await
    }

    /// Claim the oldest pending delivery for `worker_id`.
    async fn claim(&self, worker_id: &str) -> Result<Option<QueuedJob>, QueueError>;

    async fn complete(&self, id: Uuid) -> Result<(), QueueError>;

    /// Record a failed delivery with its reason; it stays on the failure list.
    async fn fail(&self, id: Uuid, error: &str) -> Result<(), QueueError>;

    /// Return claims older than `older_than` to pending, for redelivery after a crash.
    async fn release_stale(&self, older_than: Duration) -> Result<u64, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Oldest pending deliveries, without claiming them.
    async fn peek(&self, limit: i64) -> Result<Vec<QueuedJob>, QueueError>;

    /// Most recent failures.
    async fn failures(&self, limit: i64) -> Result<Vec<QueuedJob>, QueueError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS build_queue (
    id UUID PRIMARY KEY,
    queue TEXT NOT NULL,
    payload JSONB NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    attempts INTEGER NOT NULL DEFAULT 0,
    claimed_by TEXT,
    claimed_at TIMESTAMPTZ,
    error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    finished_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS build_queue_status_idx ON build_queue (queue, status, created_at);
"#;

/// Job queue backed by PostgreSQL.
pub struct PgJobQueue {
    pool: PgPool,
    queue: String,
}

impl PgJobQueue {
    pub fn new(pool: PgPool, queue: impl Into<String>) -> Self {
        Self {
            pool,
            queue: queue.into(),
        }
    }

    /// Connect and make sure the table exists.
    pub async fn connect(database_url: &str, queue: impl Into<String>) -> Result<Self, QueueError> {
        let pool = PgPool::connect(database_url).await?;
        let queue = Self::new(pool, queue);
        queue.migrate().await?;
        Ok(queue)
    }

    pub async fn migrate(&self) -> Result<(), QueueError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        info!(queue = %self.queue, "Queue table ready");
        Ok(())
    }

    async fn finish(
        &self,
        id: Uuid,
        status: &'static str,
        error: Option<&str>,
    ) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE build_queue
            SET status = $2, error = $3, finished_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl BuildQueue for PgJobQueue {
    fn name(&self) -> &str {
        &self.queue
    }

    async fn enqueue_payload(&self, payload: serde_json::Value) -> Result<QueuedJob, QueueError> {
        let job = sqlx::query_as::<_, QueuedJob>(
            r#"
            INSERT INTO build_queue (id, queue, payload, status, created_at)
            VALUES ($1, $2, $3, 'pending', NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&self.queue)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(job)
    }

    /// Uses SKIP LOCKED so concurrent workers never claim the same row.
    async fn claim(&self, worker_id: &str) -> Result<Option<QueuedJob>, QueueError> {
        let job = sqlx::query_as::<_, QueuedJob>(
            r#"
            UPDATE build_queue
            SET status = 'claimed', claimed_by = $2, claimed_at = NOW(), attempts = attempts + 1
            WHERE id = (
                SELECT id FROM build_queue
                WHERE queue = $1 AND status = 'pending'
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(&self.queue)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        self.finish(id, STATUS_COMPLETED, None).await
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        self.finish(id, STATUS_FAILED, Some(error)).await
    }

    async fn release_stale(&self, older_than: Duration) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE build_queue
            SET status = 'pending', claimed_by = NULL, claimed_at = NULL
            WHERE queue = $1
              AND status = 'claimed'
              AND claimed_at < NOW() - make_interval(secs => $2)
            "#,
        )
        .bind(&self.queue)
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM build_queue WHERE queue = $1 GROUP BY status",
        )
        .bind(&self.queue)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = QueueStats::default();
        for (status, count) in rows {
            match status.as_str() {
                STATUS_PENDING => stats.pending = count,
                STATUS_CLAIMED => stats.working = count,
                STATUS_COMPLETED => stats.completed = count,
                STATUS_FAILED => stats.failed = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn peek(&self, limit: i64) -> Result<Vec<QueuedJob>, QueueError> {
        let jobs = sqlx::query_as::<_, QueuedJob>(
            r#"
            SELECT * FROM build_queue
            WHERE queue = $1 AND status = 'pending'
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(&self.queue)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn failures(&self, limit: i64) -> Result<Vec<QueuedJob>, QueueError> {
        let jobs = sqlx::query_as::<_, QueuedJob>(
            r#"
            SELECT * FROM build_queue
            WHERE queue = $1 AND status = 'failed'
            ORDER BY finished_at DESC
            LIMIT $2
            "#,
        )
        .bind(&self.queue)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }
}
