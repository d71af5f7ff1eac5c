use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use folio_documents::{Notification, NotificationKind};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::DuplicatePayload;
use crate::pipeline::run::load_owned;
use crate::store::StoreError;

/// Copies a document under the id chosen by the producer.
pub struct DuplicateHandler {
    deps: PipelineDeps,
}

impl DuplicateHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl JobHandler for DuplicateHandler {
    const TOPIC: Topic = Topic::Duplicate;
    type Payload = DuplicatePayload;

    async fn handle(&self, job: &Job, payload: DuplicatePayload) -> PipelineResult<()> {
        let documents = self.deps.records.documents.as_ref();
        let target = payload.target_document_id;

        match documents.get(target).await? {
            Some(existing) if existing.owned_by(payload.user_id) => {
                debug!(document_id = %target, job_id = %job.id, "copy already exists");
            }
            Some(_) => {
                return Err(PipelineError::Conflict(format!(
                    "document {target} belongs to another user"
                )));
            }
            None => {
                let source = load_owned(documents, payload.document_id, payload.user_id).await?;
                match documents.insert(source.duplicate(target)).await {
                    Ok(_) | Err(StoreError::Conflict(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                info!(source_id = %payload.document_id, document_id = %target, job_id = %job.id, "document duplicated");
            }
        }

        let notification = Notification::new(
            payload.user_id,
            NotificationKind::DuplicateReady,
            "Your copy is ready",
            json!({
                "documentId": target,
                "sourceDocumentId": payload.document_id,
            }),
        )
        .from_job(job.id);
        self.deps.records.notifications.append(notification).await?;
        Ok(())
    }
}
