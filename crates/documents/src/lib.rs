//! Document domain for the content-processing pipeline.
//!
//! Records the pipeline reads and writes (documents, versions, import runs,
//! notifications, publish targets), the per-run status state machine, and the
//! deterministic algorithms handlers fall back on when the AI dependency is
//! unavailable. Pure logic only: no IO, no async, no storage.

pub mod analysis;
pub mod document;
pub mod import;
pub mod notification;
pub mod publish;
pub mod sections;
pub mod status;
pub mod version;

pub use analysis::{AtsReport, Check, CritiqueReport, KeywordMatch, SeoAudit};
pub use document::{
    Document, DocumentAnalysis, DocumentContent, DocumentType, HealthScore, Section, SectionKind,
    SeoMetadata,
};
pub use import::{
    EducationEntry, ExperienceEntry, ImportRun, ImportStatus, NormalizedProfile, ProjectEntry,
    Provider, merge_profiles,
};
pub use notification::{Notification, NotificationKind};
pub use publish::{PublishTarget, validate_subdomain};
pub use status::{GeneratingStatus, JobStatus, StepOutcome};
pub use version::DocumentVersion;
