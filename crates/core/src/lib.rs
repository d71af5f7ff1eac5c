//! `folio-core`: shared building blocks for the content pipeline.
//!
//! Identifiers, the domain error model and the optimistic concurrency
//! expectation. No IO lives here.

pub mod error;
pub mod id;
pub mod version;

pub use error::{DomainError, DomainResult};
pub use id::{
    DocumentId, ImportRunId, JobId, NotificationId, PublishTargetId, UserId, VersionId,
};
pub use version::ExpectedVersion;
