//! Job execution for Dockhand.
//!
//! Runs queued jobs through fetch, configure, build and notify, and manages the queue
//! they arrive on. PostgreSQL with SKIP LOCKED backs the queue; an in-memory queue
//! behind the `testing` feature stands in for it in tests.

mod assets;
pub mod locks;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod orchestrator;
pub mod queue;
pub mod state;
pub mod worker;

pub use locks::WorkspaceLocks;
#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryQueue;
pub use orchestrator::{JobError, JobOrchestrator, JobReport, build_message};
pub use queue::{BuildQueue, PgJobQueue, QueueError, QueueStats, QueuedJob};
pub use state::{IllegalTransition, JobState};
pub use worker::{Processed, Worker, WorkerPool};
