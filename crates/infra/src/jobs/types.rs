//! Core job types and policies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{JobId, UserId};

/// Queue partition; one per job kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    Generate,
    Duplicate,
    Critique,
    AtsScan,
    SeoAudit,
    ImportUnify,
    Publish,
    BillingNotify,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Generate,
        Topic::Duplicate,
        Topic::Critique,
        Topic::AtsScan,
        Topic::SeoAudit,
        Topic::ImportUnify,
        Topic::Publish,
        Topic::BillingNotify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Generate => "generate",
            Topic::Duplicate => "duplicate",
            Topic::Critique => "critique",
            Topic::AtsScan => "ats-scan",
            Topic::SeoAudit => "seo-audit",
            Topic::ImportUnify => "import-unify",
            Topic::Publish => "publish",
            Topic::BillingNotify => "billing-notify",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown topic: {s}"))
    }
}

/// Queue-side execution state of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobState {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker; the lease decides when it may be redelivered.
    Running,
    Completed,
    /// Failed, will be retried once `run_at` passes.
    Failed { error: String, attempt: u32 },
    /// Permanent failure or retries exhausted.
    DeadLettered { error: String, attempts: u32 },
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed { .. } => "failed",
            JobState::DeadLettered { .. } => "dead_lettered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::DeadLettered { .. })
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first delivery.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before the retry that follows `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Record of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub topic: Topic,
    /// User on whose behalf the job runs.
    pub user_id: UserId,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub retry_policy: RetryPolicy,
    /// Deliveries so far; incremented on every claim.
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Earliest time the job may be claimed (retry backoff).
    pub run_at: Option<DateTime<Utc>>,
    /// Deadline of the current claim.
    pub lease_until: Option<DateTime<Utc>>,
    pub history: Vec<JobAttemptRecord>,
}

impl Job {
    pub fn new(topic: Topic, user_id: UserId, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            topic,
            user_id,
            payload,
            state: JobState::Pending,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            enqueued_at: now,
            updated_at: now,
            run_at: None,
            lease_until: None,
            history: Vec::new(),
        }
    }

    /// Pin the id, so a producer can reference the job before enqueueing it.
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Pending or awaiting retry with its backoff elapsed, or running with
    /// an expired lease.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            JobState::Pending | JobState::Failed { .. } => self.run_at.is_none_or(|at| at <= now),
            JobState::Running => self.lease_until.is_some_and(|until| until <= now),
            JobState::Completed | JobState::DeadLettered { .. } => false,
        }
    }

    /// True when this claim is a redelivery of a job whose previous worker
    /// never reported back.
    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1 && self.history.len() < (self.attempt - 1) as usize
    }

    pub fn mark_running(&mut self, lease: Duration) {
        let now = Utc::now();
        self.state = JobState::Running;
        self.attempt += 1;
        self.lease_until = Some(now + to_chrono(lease));
        self.updated_at = now;
    }

    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.state = JobState::Completed;
        self.lease_until = None;
        self.updated_at = now;
        self.record(started_at, now, None);
    }

    /// Record a failed attempt. Schedules a retry unless `permanent` or the
    /// policy is exhausted, in which case the job becomes dead-lettered.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>, permanent: bool) {
        let now = Utc::now();
        self.updated_at = now;
        self.lease_until = None;
        self.record(started_at, now, Some(error.clone()));

        if !permanent && self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.run_at = Some(now + to_chrono(delay));
            self.state = JobState::Failed {
                error,
                attempt: self.attempt,
            };
        } else {
            self.state = JobState::DeadLettered {
                error,
                attempts: self.attempt,
            };
        }
    }

    pub fn is_dead_lettered(&self) -> bool {
        matches!(self.state, JobState::DeadLettered { .. })
    }

    fn record(&mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: Option<String>) {
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at,
            success: error.is_none(),
            error,
        });
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Entry in the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub job: Job,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

impl DeadLetterEntry {
    pub fn new(job: Job, reason: String) -> Self {
        Self {
            job,
            dead_lettered_at: Utc::now(),
            reason,
        }
    }
}
