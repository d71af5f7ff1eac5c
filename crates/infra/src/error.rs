//! Pipeline error model.

use thiserror::Error;

use folio_core::DomainError;

use crate::jobs::QueueError;
use crate::store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error returned by producers and job handlers.
///
/// The split drives redelivery: permanent errors dead-letter the job at once,
/// retryable ones go back on the queue with backoff.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Target record missing or not owned by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Job payload could not be decoded.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Another run or writer owns the record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The status store or another record store failed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// An external collaborator without a fallback failed.
    #[error("external failure: {0}")]
    External(String),

    #[error("queue failure: {0}")]
    Queue(String),
}

impl PipelineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Redelivery cannot fix this error.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PipelineError::NotFound(_)
                | PipelineError::InvalidPayload(_)
                | PipelineError::Validation(_)
                | PipelineError::Conflict(_)
        )
    }
}

impl From<DomainError> for PipelineError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound => PipelineError::NotFound("record".to_string()),
            DomainError::Validation(m) | DomainError::InvalidId(m) => PipelineError::Validation(m),
            DomainError::InvalidTransition(m) | DomainError::Conflict(m) => {
                PipelineError::Conflict(m)
            }
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => PipelineError::NotFound(what),
            StoreError::Conflict(m) => PipelineError::Conflict(m),
            StoreError::Storage(m) => PipelineError::Persistence(m),
        }
    }
}

impl From<QueueError> for PipelineError {
    fn from(e: QueueError) -> Self {
        PipelineError::Queue(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(PipelineError::not_found("document").is_permanent());
        assert!(PipelineError::from(DomainError::conflict("busy")).is_permanent());
        assert!(!PipelineError::Persistence("db down".into()).is_permanent());
        assert!(!PipelineError::External("github".into()).is_permanent());
        assert!(!PipelineError::from(StoreError::Storage("io".into())).is_permanent());
    }
}
