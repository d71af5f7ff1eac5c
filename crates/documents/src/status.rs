//! Per-run status state machine stored on every document.
//!
//! `idle → queued → processing → {completed, failed}`. A new run may start
//! from `idle` or a terminal state; inside a run the state only moves
//! forward. Every step names the job that owns the run, which is what makes
//! redelivered jobs recognisable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{DomainError, DomainResult, JobId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratingStatus {
    Idle,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl GeneratingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, GeneratingStatus::Completed | GeneratingStatus::Failed)
    }

    /// Queued or processing: a client should keep polling.
    pub fn is_in_flight(self) -> bool {
        matches!(self, GeneratingStatus::Queued | GeneratingStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GeneratingStatus::Idle => "idle",
            GeneratingStatus::Queued => "queued",
            GeneratingStatus::Processing => "processing",
            GeneratingStatus::Completed => "completed",
            GeneratingStatus::Failed => "failed",
        }
    }
}

/// What a step did to the state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The state moved.
    Applied,
    /// The same job already took this step (redelivery while in flight).
    Redelivered,
    /// The same job already finished this run; the caller has nothing to do.
    AlreadyTerminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: GeneratingStatus,
    pub job_id: Option<JobId>,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    pub fn idle() -> Self {
        Self {
            state: GeneratingStatus::Idle,
            job_id: None,
            message: None,
            updated_at: Utc::now(),
        }
    }

    /// Start a new run owned by `job_id`.
    pub fn queue(&mut self, job_id: JobId) -> DomainResult<StepOutcome> {
        match self.state {
            GeneratingStatus::Idle | GeneratingStatus::Completed | GeneratingStatus::Failed => {
                self.set(GeneratingStatus::Queued, Some(job_id), None);
                Ok(StepOutcome::Applied)
            }
            GeneratingStatus::Queued | GeneratingStatus::Processing => {
                if self.job_id == Some(job_id) {
                    return Ok(StepOutcome::Redelivered);
                }
                Err(DomainError::conflict(format!(
                    "a job is already {} for this document",
                    self.state.as_str()
                )))
            }
        }
    }

    /// A worker picked up the run.
    pub fn begin(&mut self, job_id: JobId) -> DomainResult<StepOutcome> {
        self.ensure_owner(job_id)?;
        match self.state {
            GeneratingStatus::Queued => {
                self.set(GeneratingStatus::Processing, Some(job_id), None);
                Ok(StepOutcome::Applied)
            }
            GeneratingStatus::Processing => Ok(StepOutcome::Redelivered),
            GeneratingStatus::Completed | GeneratingStatus::Failed => {
                Ok(StepOutcome::AlreadyTerminal)
            }
            GeneratingStatus::Idle => Err(self.illegal("begin")),
        }
    }

    /// Finish the run successfully. Only legal after `processing` was observed.
    pub fn complete(&mut self, job_id: JobId) -> DomainResult<StepOutcome> {
        self.ensure_owner(job_id)?;
        match self.state {
            GeneratingStatus::Processing => {
                self.set(GeneratingStatus::Completed, Some(job_id), None);
                Ok(StepOutcome::Applied)
            }
            GeneratingStatus::Completed => Ok(StepOutcome::AlreadyTerminal),
            _ => Err(self.illegal("complete")),
        }
    }

    /// Finish the run with an error message. A run that never reached a
    /// worker may fail straight from `queued`.
    pub fn fail(&mut self, job_id: JobId, message: impl Into<String>) -> DomainResult<StepOutcome> {
        self.ensure_owner(job_id)?;
        match self.state {
            GeneratingStatus::Queued | GeneratingStatus::Processing => {
                self.set(GeneratingStatus::Failed, Some(job_id), Some(message.into()));
                Ok(StepOutcome::Applied)
            }
            GeneratingStatus::Failed => Ok(StepOutcome::AlreadyTerminal),
            _ => Err(self.illegal("fail")),
        }
    }

    fn ensure_owner(&self, job_id: JobId) -> DomainResult<()> {
        match self.job_id {
            Some(owner) if owner != job_id => Err(DomainError::conflict(format!(
                "run is owned by job {owner}, not {job_id}"
            ))),
            _ => Ok(()),
        }
    }

    fn illegal(&self, step: &str) -> DomainError {
        DomainError::invalid_transition(format!("cannot {step} from {}", self.state.as_str()))
    }

    fn set(&mut self, state: GeneratingStatus, job_id: Option<JobId>, message: Option<String>) {
        self.state = state;
        self.job_id = job_id;
        self.message = message;
        self.updated_at = Utc::now();
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_run_moves_forward() {
        let job = JobId::new();
        let mut status = JobStatus::idle();

        assert_eq!(status.queue(job).unwrap(), StepOutcome::Applied);
        assert_eq!(status.begin(job).unwrap(), StepOutcome::Applied);
        assert_eq!(status.complete(job).unwrap(), StepOutcome::Applied);
        assert_eq!(status.state, GeneratingStatus::Completed);
    }

    #[test]
    fn complete_without_processing_is_rejected() {
        let job = JobId::new();
        let mut status = JobStatus::idle();
        status.queue(job).unwrap();

        let err = status.complete(job).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(status.state, GeneratingStatus::Queued);

        let mut idle = JobStatus::idle();
        assert!(matches!(
            idle.complete(job),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn begin_from_idle_is_rejected() {
        let mut status = JobStatus::idle();
        assert!(matches!(
            status.begin(JobId::new()),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn second_run_conflicts_while_first_is_in_flight() {
        let first = JobId::new();
        let mut status = JobStatus::idle();
        status.queue(first).unwrap();
        status.begin(first).unwrap();

        assert!(matches!(
            status.queue(JobId::new()),
            Err(DomainError::Conflict(_))
        ));
        assert!(matches!(
            status.complete(JobId::new()),
            Err(DomainError::Conflict(_))
        ));
    }

    #[test]
    fn redelivery_is_recognised() {
        let job = JobId::new();
        let mut status = JobStatus::idle();
        status.queue(job).unwrap();
        status.begin(job).unwrap();

        assert_eq!(status.begin(job).unwrap(), StepOutcome::Redelivered);

        status.complete(job).unwrap();
        assert_eq!(status.begin(job).unwrap(), StepOutcome::AlreadyTerminal);
        assert_eq!(status.complete(job).unwrap(), StepOutcome::AlreadyTerminal);
        assert_eq!(status.state, GeneratingStatus::Completed);
    }

    #[test]
    fn terminal_state_never_moves_back_inside_a_run() {
        let job = JobId::new();
        let mut status = JobStatus::idle();
        status.queue(job).unwrap();
        status.begin(job).unwrap();
        status.fail(job, "boom").unwrap();

        assert_eq!(status.begin(job).unwrap(), StepOutcome::AlreadyTerminal);
        assert!(status.complete(job).is_err());
        assert_eq!(status.state, GeneratingStatus::Failed);
        assert_eq!(status.message.as_deref(), Some("boom"));
    }

    #[test]
    fn new_run_may_start_after_failure() {
        let first = JobId::new();
        let second = JobId::new();
        let mut status = JobStatus::idle();
        status.queue(first).unwrap();
        status.fail(first, "enqueue failed").unwrap();

        assert_eq!(status.queue(second).unwrap(), StepOutcome::Applied);
        assert_eq!(status.job_id, Some(second));
        assert!(status.message.is_none());
    }
}
