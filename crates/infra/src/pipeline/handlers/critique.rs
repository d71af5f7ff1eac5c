use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use folio_ai::prompts::{parse_suggestions, suggestion_prompt};
use folio_ai::{GenerationRequest, generate_within};
use folio_documents::{CritiqueReport, Document, HealthScore, Notification, NotificationKind};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::AnalysisPayload;
use crate::pipeline::run::{RunStart, begin_run, complete_run};

use super::{RunNotices, announce_completion, fail_document_job};

const NOTICES: RunNotices = RunNotices {
    failed: NotificationKind::AnalysisFailed,
    failed_title: "Critique failed",
    ready: ready_notice,
};

fn ready_notice(job: &Job, doc: &Document) -> Option<Notification> {
    let overall = doc.analysis.critique.as_ref()?.overall;
    let notification = Notification::new(
        doc.owner_id,
        NotificationKind::CritiqueReady,
        format!("Critique ready: {overall}/100"),
        json!({ "documentId": doc.id, "overall": overall }),
    )
    .from_job(job.id);
    Some(notification)
}

const MAX_SUGGESTIONS: usize = 5;
const SUGGESTION_MAX_TOKENS: u32 = 512;

pub struct CritiqueHandler {
    deps: PipelineDeps,
}

impl CritiqueHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Best-effort: an empty list when the generator fails.
    async fn suggestions(&self, job: &Job, doc: &Document) -> Vec<String> {
        let request = GenerationRequest::new(suggestion_prompt(
            doc.doc_type.label(),
            &doc.content.serialized(),
        ))
        .with_max_tokens(SUGGESTION_MAX_TOKENS);
        match generate_within(
            self.deps.generator.as_ref(),
            &request,
            self.deps.config.suggestion_timeout,
        )
        .await
        {
            Ok(text) => parse_suggestions(&text, MAX_SUGGESTIONS),
            Err(e) => {
                warn!(document_id = %doc.id, job_id = %job.id, error = %e, "no AI suggestions");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl JobHandler for CritiqueHandler {
    const TOPIC: Topic = Topic::Critique;
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

        let report = CritiqueReport::score(doc.doc_type, &doc.content)
            .with_suggestions(self.suggestions(job, &doc).await);
        let overall = report.overall;

        let doc = complete_run(documents, payload.document_id, job.id, |doc| {
            doc.health_score = HealthScore::new(i64::from(overall));
            doc.analysis.critique = Some(report.clone());
        })
        .await?;
        announce_completion(&self.deps, job, &doc, &NOTICES).await?;

        info!(document_id = %payload.document_id, job_id = %job.id, overall, "critique stored");
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
    use std::sync::Arc;

    use super::*;
    use folio_core::UserId;
    use folio_documents::{DocumentType, GeneratingStatus};

    use crate::pipeline::run::queue_run;
    use crate::pipeline::testing::{
        RecordingMailer, ScriptedGenerator, StubProviders, claimed, deps_with, offline_deps,
        seed_document,
    };

    async fn run(deps: &PipelineDeps) -> Document {
        let user = UserId::new();
        let doc = seed_document(&deps.records, user, DocumentType::CoverLetter, "Letter").await;
        let payload = AnalysisPayload {
            document_id: doc.id,
            user_id: user,
            job_description: None,
        };
        let job = claimed(Topic::Critique, user, &payload);
        queue_run(deps.records.documents.as_ref(), doc.id, user, job.id)
            .await
            .unwrap();
        CritiqueHandler::new(deps.clone())
            .handle(&job, payload)
            .await
            .unwrap();
        deps.records.documents.get(doc.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn empty_document_scores_without_ai() {
        let deps = offline_deps();
        let doc = run(&deps).await;

        let report = doc.analysis.critique.unwrap();
        assert_eq!(report.completeness, 0);
        assert_eq!(report.readability, 50);
        assert_eq!(report.ats, 55);
        assert_eq!(report.seo, 45);
        assert_eq!(report.overall, 38);
        assert!(report.suggestions.is_empty());
        assert_eq!(doc.health_score.value(), 38);
        assert_eq!(doc.status.state, GeneratingStatus::Completed);

        let notes = deps.records.notifications.list_for_user(doc.owner_id).await.unwrap();
        assert_eq!(notes[0].title, "Critique ready: 38/100");
    }

    #[tokio::test]
    async fn suggestions_do_not_change_score() {
        let deps = deps_with(
            Arc::new(ScriptedGenerator::replying("- Add metrics\n- Name the company")),
            Arc::new(StubProviders::default()),
            Arc::new(RecordingMailer::default()),
        );
        let doc = run(&deps).await;

        let report = doc.analysis.critique.unwrap();
        assert_eq!(report.overall, 38);
        assert_eq!(report.suggestions, ["Add metrics", "Name the company"]);
    }
}
