use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use folio_documents::{Document, Notification, NotificationKind, SeoAudit};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::AnalysisPayload;
use crate::pipeline::run::{RunStart, begin_run, complete_run};

use super::{RunNotices, announce_completion, fail_document_job};

const NOTICES: RunNotices = RunNotices {
    failed: NotificationKind::AnalysisFailed,
    failed_title: "SEO audit failed",
    ready: ready_notice,
};

fn ready_notice(job: &Job, doc: &Document) -> Option<Notification> {
    let score = doc.analysis.seo.as_ref()?.score;
    let notification = Notification::new(
        doc.owner_id,
        NotificationKind::SeoAuditReady,
        format!("SEO audit complete: {score}/100"),
        json!({ "documentId": doc.id, "score": score }),
    )
    .from_job(job.id);
    Some(notification)
}

/// Audits stored SEO metadata. Leaves the health score alone.
pub struct SeoAuditHandler {
    deps: PipelineDeps,
}

impl SeoAuditHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl JobHandler for SeoAuditHandler {
    const TOPIC: Topic = Topic::SeoAudit;
    type Payload = AnalysisPayload;

    async fn handle(&self, job: &Job, payload: AnalysisPayload) -> PipelineResult<()> {
        let documents = self.deps.records.documents.as_ref();
        let doc = match begin_run(documents, payload.document_id, payload.user_id, job.id).await? {
            RunStart::Proceed(doc) => doc,
            RunStart::Done(doc) => {
                debug!(document_id = %payload.document_id, job_id = %job.id, "run already finished");
                return announce_completion(&self.deps, job, &doc, &NOTICES).await;
            }
        };

        let audit = SeoAudit::audit(&doc.seo, doc.content.serialized().len());
        let score = audit.score;

        let doc = complete_run(documents, payload.document_id, job.id, |doc| {
            doc.analysis.seo = Some(audit.clone());
        })
        .await?;
        announce_completion(&self.deps, job, &doc, &NOTICES).await?;

        info!(document_id = %payload.document_id, job_id = %job.id, score, "seo audit stored");
        Ok(())
    }

    async fn on_terminal_failure(
        &self,
        job: &Job,
        payload: AnalysisPayload,
        error: &PipelineError,
    ) -> PipelineResult<()> {
        fail_document_job(
            &self.deps,
            job,
            payload.document_id,
            payload.user_id,
            &NOTICES,
            error,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{ExpectedVersion, UserId};
    use folio_documents::{DocumentType, GeneratingStatus};

    use crate::pipeline::run::queue_run;
    use crate::pipeline::testing::{claimed, offline_deps, seed_document};

    #[tokio::test]
    async fn audit_uses_stored_metadata() {
        let deps = offline_deps();
        let user = UserId::new();
        let mut doc = seed_document(&deps.records, user, DocumentType::Portfolio, "Site").await;
        doc.seo.title = "Ada Lovelace, analytical engine programmer".into();
        doc.seo.keywords = vec!["rust".into(), "systems".into(), "portfolio".into()];
        doc.seo.og_image = Some("https://cdn.example.com/og.png".into());
        let doc = deps
            .records
            .documents
            .save(&doc, ExpectedVersion::Any)
            .await
            .unwrap();

        let payload = AnalysisPayload {
            document_id: doc.id,
            user_id: user,
            job_description: None,
        };
        let job = claimed(Topic::SeoAudit, user, &payload);
        queue_run(deps.records.documents.as_ref(), doc.id, user, job.id)
            .await
            .unwrap();
        SeoAuditHandler::new(deps.clone())
            .handle(&job, payload)
            .await
            .unwrap();

        let doc = deps.records.documents.get(doc.id).await.unwrap().unwrap();
        assert_eq!(doc.status.state, GeneratingStatus::Completed);
        // title 20 + keywords 15 + og image 15
        assert_eq!(doc.analysis.seo.unwrap().score, 50);
        assert_eq!(doc.health_score.value(), 0);
    }
}
