//! Topic-partitioned job queue with at-least-once delivery, retry with
//! backoff, dead-lettering, and the worker pool that drains it.
//!
//! ## Components
//!
//! - `Job`: one unit of queued work with its payload and attempt history
//! - `JobQueue`: persistence and claiming (in-memory or Postgres)
//! - `WorkerPool`: one consumer per topic, typed handlers, retry policy
//!
//! A claimed job carries a lease. A worker that dies mid-job never releases
//! it, so once the lease expires the queue hands the job out again; that is
//! the redelivery path handlers must tolerate.

pub mod executor;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod queue;
pub mod types;

pub use executor::{JobHandler, WorkerConfig, WorkerPool, WorkerPoolHandle, WorkerStats};
#[cfg(feature = "postgres")]
pub use postgres::PostgresJobQueue;
pub use queue::{InMemoryJobQueue, JobQueue, QueueError, QueueStats};
pub use types::{DeadLetterEntry, Job, JobAttemptRecord, JobState, RetryPolicy, Topic};
