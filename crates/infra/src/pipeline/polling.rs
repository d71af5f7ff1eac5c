//! Read side used by client polling.

use serde::Serialize;

use folio_core::{DocumentId, ImportRunId, JobId, NotificationId, UserId};
use folio_documents::Notification;

use crate::error::{PipelineError, PipelineResult};

use super::Records;
use super::run::load_owned;

/// Current state of one run as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
}

pub struct StatusReader {
    records: Records,
}

impl StatusReader {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    pub async fn document_status(
        &self,
        user_id: UserId,
        document_id: DocumentId,
    ) -> PipelineResult<StatusView> {
        let doc = load_owned(self.records.documents.as_ref(), document_id, user_id).await?;
        Ok(StatusView {
            status: doc.status.state.as_str(),
            progress_pct: None,
            message: doc.status.message,
            job_id: doc.status.job_id,
        })
    }

    pub async fn import_status(
        &self,
        user_id: UserId,
        run_id: ImportRunId,
    ) -> PipelineResult<StatusView> {
        let run = self
            .records
            .imports
            .get(run_id)
            .await?
            .filter(|run| run.user_id == user_id)
            .ok_or_else(|| PipelineError::not_found(format!("import run {run_id}")))?;
        Ok(StatusView {
            status: run.status.as_str(),
            progress_pct: Some(run.progress_pct),
            message: run.message,
            job_id: run.job_id,
        })
    }

    /// The user's notifications, newest first.
    pub async fn notifications(&self, user_id: UserId) -> PipelineResult<Vec<Notification>> {
        Ok(self.records.notifications.list_for_user(user_id).await?)
    }

    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> PipelineResult<Notification> {
        Ok(self.records.notifications.mark_read(user_id, id).await?)
    }
}
