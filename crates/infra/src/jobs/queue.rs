//! Queue storage abstraction and the in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use folio_core::JobId;

use super::types::{DeadLetterEntry, Job, JobState, Topic};

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("job serialization failed: {0}")]
    Serialization(String),
    #[error("queue storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

/// Durable, topic-partitioned, at-least-once job channel.
#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError>;

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, QueueError>;

    /// Atomically claim the oldest claimable job of `topic`: mark it running,
    /// bump its attempt counter and stamp a lease of `lease`.
    async fn claim_next(&self, topic: Topic, lease: Duration) -> Result<Option<Job>, QueueError>;

    async fn update(&self, job: &Job) -> Result<(), QueueError>;

    /// Remove the job from circulation and keep it for inspection.
    async fn dead_letter(&self, job: Job, reason: String) -> Result<(), QueueError>;

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;
}

/// Completed jobs kept for inspection by default.
const DEFAULT_COMPLETED_RETENTION: usize = 1024;

/// In-memory queue for tests and single-process deployments.
///
/// Only the newest completed jobs are kept; older ones are evicted and only
/// counted, so a long-running process does not grow without bound.
#[derive(Debug)]
pub struct InMemoryJobQueue {
    jobs: RwLock<HashMap<JobId, Job>>,
    dead_letters: RwLock<HashMap<JobId, DeadLetterEntry>>,
    completed: RwLock<CompletedLog>,
    completed_retention: usize,
}

#[derive(Debug, Default)]
struct CompletedLog {
    /// Oldest first.
    order: VecDeque<JobId>,
    evicted: usize,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self {
            jobs: RwLock::default(),
            dead_letters: RwLock::default(),
            completed: RwLock::default(),
            completed_retention: DEFAULT_COMPLETED_RETENTION,
        }
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completed_retention(mut self, retention: usize) -> Self {
        self.completed_retention = retention;
        self
    }
}

fn poisoned<T>(_: T) -> QueueError {
    QueueError::Storage("queue lock poisoned".to_string())
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(QueueError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, QueueError> {
        if let Some(job) = self.jobs.read().map_err(poisoned)?.get(&job_id) {
            return Ok(Some(job.clone()));
        }
        let dls = self.dead_letters.read().map_err(poisoned)?;
        Ok(dls.get(&job_id).map(|e| e.job.clone()))
    }

    async fn claim_next(&self, topic: Topic, lease: Duration) -> Result<Option<Job>, QueueError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let now = Utc::now();

        let next = jobs
            .values()
            .filter(|j| j.topic == topic && j.is_claimable(now))
            .min_by_key(|j| (j.enqueued_at, j.id))
            .map(|j| j.id);

        Ok(next.and_then(|id| {
            jobs.get_mut(&id).map(|job| {
                job.mark_running(lease);
                job.clone()
            })
        }))
    }

    async fn update(&self, job: &Job) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let slot = jobs.get_mut(&job.id).ok_or(QueueError::NotFound(job.id))?;
        let newly_completed =
            job.state == JobState::Completed && slot.state != JobState::Completed;
        *slot = job.clone();

        if newly_completed {
            let mut completed = self.completed.write().map_err(poisoned)?;
            completed.order.push_back(job.id);
            while completed.order.len() > self.completed_retention {
                if let Some(oldest) = completed.order.pop_front() {
                    jobs.remove(&oldest);
                    completed.evicted += 1;
                }
            }
        }
        Ok(())
    }

    async fn dead_letter(&self, mut job: Job, reason: String) -> Result<(), QueueError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let mut dls = self.dead_letters.write().map_err(poisoned)?;

        if !job.is_dead_lettered() {
            job.state = JobState::DeadLettered {
                error: reason.clone(),
                attempts: job.attempt,
            };
            job.updated_at = Utc::now();
        }

        jobs.remove(&job.id);
        dls.insert(job.id, DeadLetterEntry::new(job, reason));
        Ok(())
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError> {
        let dls = self.dead_letters.read().map_err(poisoned)?;
        let mut result: Vec<_> = dls.values().cloned().collect();
        result.sort_by_key(|e| e.dead_lettered_at);
        result.truncate(limit);
        Ok(result)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        let dls = self.dead_letters.read().map_err(poisoned)?;

        let mut stats = QueueStats::default();
        for job in jobs.values() {
            match &job.state {
                JobState::Pending => stats.pending += 1,
                JobState::Running => stats.running += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed { .. } => stats.failed += 1,
                JobState::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }
        stats.dead_lettered += dls.len();
        stats.completed += self.completed.read().map_err(poisoned)?.evicted;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::UserId;

    fn job(topic: Topic) -> Job {
        Job::new(topic, UserId::new(), serde_json::json!({}))
    }

    #[tokio::test]
    async fn enqueue_and_claim_by_topic() {
        let queue = InMemoryJobQueue::new();
        let id = queue.enqueue(job(Topic::Critique)).await.unwrap();

        assert!(queue
            .claim_next(Topic::Generate, Duration::from_secs(30))
            .await
            .unwrap()
            .is_none());

        let claimed = queue
            .claim_next(Topic::Critique, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.state, JobState::Running);
        assert_eq!(claimed.attempt, 1);

        assert!(queue
            .claim_next(Topic::Critique, Duration::from_secs(30))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let queue = InMemoryJobQueue::new();
        let j = job(Topic::Publish);
        queue.enqueue(j.clone()).await.unwrap();
        assert!(matches!(
            queue.enqueue(j).await,
            Err(QueueError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn expired_lease_is_redelivered() {
        let queue = InMemoryJobQueue::new();
        let id = queue.enqueue(job(Topic::Generate)).await.unwrap();

        // Worker claims and "crashes": the lease runs out immediately.
        queue.claim_next(Topic::Generate, Duration::ZERO).await.unwrap().unwrap();

        let again = queue
            .claim_next(Topic::Generate, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.id, id);
        assert_eq!(again.attempt, 2);
        assert!(again.is_redelivery());
    }

    #[tokio::test]
    async fn dead_letter_flow() {
        let queue = InMemoryJobQueue::new();
        let id = queue.enqueue(job(Topic::ImportUnify)).await.unwrap();
        let claimed = queue
            .claim_next(Topic::ImportUnify, Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        queue.dead_letter(claimed, "no handler".into()).await.unwrap();

        let dls = queue.list_dead_letters(10).await.unwrap();
        assert_eq!(dls.len(), 1);
        assert_eq!(dls[0].job.id, id);
        assert!(queue.get(id).await.unwrap().unwrap().is_dead_lettered());
        assert_eq!(queue.stats().await.unwrap().dead_lettered, 1);
    }

    #[tokio::test]
    async fn stats_tracking() {
        let queue = InMemoryJobQueue::new();
        for _ in 0..3 {
            queue.enqueue(job(Topic::SeoAudit)).await.unwrap();
        }
        queue.claim_next(Topic::SeoAudit, Duration::from_secs(30)).await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.running, 1);
    }

    #[tokio::test]
    async fn only_the_newest_completed_jobs_are_kept() {
        let queue = InMemoryJobQueue::new().with_completed_retention(2);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = queue.enqueue(job(Topic::Critique)).await.unwrap();
            let mut claimed = queue
                .claim_next(Topic::Critique, Duration::from_secs(30))
                .await
                .unwrap()
                .unwrap();
            claimed.mark_completed(Utc::now());
            queue.update(&claimed).await.unwrap();
            // a repeated completion write does not count twice
            queue.update(&claimed).await.unwrap();
            ids.push(id);
        }

        assert!(queue.get(ids[0]).await.unwrap().is_none());
        assert_eq!(
            queue.get(ids[2]).await.unwrap().unwrap().state,
            JobState::Completed
        );
        assert_eq!(queue.stats().await.unwrap().completed, 3);
    }
}
