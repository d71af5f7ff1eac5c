use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use folio_documents::{Notification, NotificationKind};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::PublishPayload;
use crate::pipeline::run::{load_owned, modify_document};

/// Activates a publish target and makes its document public. Every write is
/// a no-op on an already published target.
pub struct PublishHandler {
    deps: PipelineDeps,
}

impl PublishHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// URL the document went live under, if this job's target is active and
    /// the document serves it.
    async fn live_url(&self, payload: &PublishPayload) -> PipelineResult<Option<String>> {
        let records = &self.deps.records;
        let Some(target) = records
            .publish_targets
            .get(payload.target_id)
            .await?
            .filter(|t| t.is_active && t.document_id == payload.document_id)
        else {
            return Ok(None);
        };
        let url = target.public_url(&self.deps.config.public_base_domain);
        let live = records
            .documents
            .get(payload.document_id)
            .await?
            .is_some_and(|doc| doc.is_public && doc.public_url.as_deref() == Some(url.as_str()));
        Ok(live.then_some(url))
    }
}

fn live_notice(job: &Job, payload: &PublishPayload, url: &str) -> Notification {
    Notification::new(
        payload.user_id,
        NotificationKind::PublishLive,
        "Your content is live",
        json!({ "documentId": payload.document_id, "url": url }),
    )
    .from_job(job.id)
}

#[async_trait]
impl JobHandler for PublishHandler {
    const TOPIC: Topic = Topic::Publish;
    type Payload = PublishPayload;

    async fn handle(&self, job: &Job, payload: PublishPayload) -> PipelineResult<()> {
        let records = &self.deps.records;
        let mut target = records
            .publish_targets
            .get(payload.target_id)
            .await?
            .filter(|t| t.document_id == payload.document_id && t.owner_id == payload.user_id)
            .ok_or_else(|| PipelineError::not_found(format!("publish target {}", payload.target_id)))?;
        load_owned(records.documents.as_ref(), payload.document_id, payload.user_id).await?;

        if target.activate(Utc::now()) {
            records.publish_targets.upsert(&target).await?;
        }
        let url = target.public_url(&self.deps.config.public_base_domain);

        modify_document(records.documents.as_ref(), payload.document_id, |doc| {
            doc.is_public = true;
            doc.public_url = Some(url.clone());
            Ok(())
        })
        .await?;

        records
            .notifications
            .append(live_notice(job, &payload, &url))
            .await?;

        info!(document_id = %payload.document_id, job_id = %job.id, %url, "document published");
        Ok(())
    }

    async fn on_terminal_failure(
        &self,
        job: &Job,
        payload: PublishPayload,
        error: &PipelineError,
    ) -> PipelineResult<()> {
        let records = &self.deps.records;
        if let Some(url) = self.live_url(&payload).await? {
            warn!(document_id = %payload.document_id, job_id = %job.id, error = %error, "published before the job gave up");
            records
                .notifications
                .append(live_notice(job, &payload, &url))
                .await?;
            return Ok(());
        }

        // Drop the URL written ahead of the job unless the document is live.
        if let Err(e) = modify_document(records.documents.as_ref(), payload.document_id, |doc| {
            if !doc.is_public {
                doc.public_url = None;
            }
            Ok(())
        })
        .await
        {
            warn!(document_id = %payload.document_id, error = %e, "could not clear public url");
        }

        let notification = Notification::new(
            payload.user_id,
            NotificationKind::PublishFailed,
            "Publishing failed",
            json!({ "documentId": payload.document_id, "error": error.to_string() }),
        )
        .from_job(job.id);
        records.notifications.append(notification).await?;
        Ok(())
    }
}
