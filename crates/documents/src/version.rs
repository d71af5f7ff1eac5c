//! Immutable content snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{DocumentId, JobId, UserId, VersionId};

use crate::document::DocumentContent;

/// Label of the snapshot the generate handler records.
pub const AI_GENERATED_LABEL: &str = "v1.0 (AI Generated)";
pub const MAIN_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: VersionId,
    pub document_id: DocumentId,
    pub label: String,
    pub branch: String,
    pub content: DocumentContent,
    pub created_by: UserId,
    /// Job that produced the snapshot; `(document_id, source_job_id)` is the
    /// natural key that keeps redelivered jobs from appending twice.
    pub source_job_id: Option<JobId>,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    /// Snapshot written by a generation job.
    pub fn generated(
        document_id: DocumentId,
        content: DocumentContent,
        created_by: UserId,
        job_id: JobId,
    ) -> Self {
        Self {
            id: VersionId::new(),
            document_id,
            label: AI_GENERATED_LABEL.to_owned(),
            branch: MAIN_BRANCH.to_owned(),
            content,
            created_by,
            source_job_id: Some(job_id),
            created_at: Utc::now(),
        }
    }

    /// Natural key of job-produced snapshots.
    pub fn job_key(&self) -> Option<(DocumentId, JobId)> {
        self.source_job_id.map(|job| (self.document_id, job))
    }
}
