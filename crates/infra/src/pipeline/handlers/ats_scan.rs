use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use folio_documents::{AtsReport, Document, HealthScore, Notification, NotificationKind};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::AnalysisPayload;
use crate::pipeline::run::{RunStart, begin_run, complete_run};

use super::{RunNotices, announce_completion, fail_document_job};

const NOTICES: RunNotices = RunNotices {
    failed: NotificationKind::AnalysisFailed,
    failed_title: "ATS scan failed",
    ready: ready_notice,
};

fn ready_notice(job: &Job, doc: &Document) -> Option<Notification> {
    let report = doc.analysis.ats.as_ref()?;
    let notification = Notification::new(
        doc.owner_id,
        NotificationKind::AtsScanReady,
        format!("ATS scan complete: {}/100", report.score),
        json!({
            "documentId": doc.id,
            "score": report.score,
            "matchScore": report.keyword_match.as_ref().map(|k| k.match_score),
        }),
    )
    .from_job(job.id);
    Some(notification)
}

pub struct AtsScanHandler {
    deps: PipelineDeps,
}

impl AtsScanHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl JobHandler for AtsScanHandler {
    const TOPIC: Topic = Topic::AtsScan;
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

        let report = AtsReport::scan(&doc.content.serialized(), payload.job_description.as_deref());
        let score = report.score;

        let doc = complete_run(documents, payload.document_id, job.id, |doc| {
            doc.health_score = HealthScore::new(i64::from(score));
            doc.analysis.ats = Some(report.clone());
        })
        .await?;
        announce_completion(&self.deps, job, &doc, &NOTICES).await?;

        info!(document_id = %payload.document_id, job_id = %job.id, score, "ats scan stored");
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
