use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, warn};

use folio_ai::prompts::{GENERATION_SYSTEM, generation_prompt};
use folio_ai::{GenerationRequest, generate_within};
use folio_documents::sections::{fallback_text, generation_health_score, map_sections};
use folio_documents::{Document, DocumentContent, DocumentVersion, Notification, NotificationKind};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobHandler, Topic};
use crate::pipeline::PipelineDeps;
use crate::pipeline::payloads::GeneratePayload;
use crate::pipeline::run::{RunStart, begin_run, complete_run};

use super::{RunNotices, announce_completion, fail_document_job};

const NOTICES: RunNotices = RunNotices {
    failed: NotificationKind::GenerationFailed,
    failed_title: "Generation failed",
    ready: ready_notice,
};

fn ready_notice(job: &Job, doc: &Document) -> Option<Notification> {
    let notification = Notification::new(
        doc.owner_id,
        NotificationKind::GenerationComplete,
        format!("Your {} is ready", doc.doc_type.label()),
        json!({
            "documentId": doc.id,
            "healthScore": doc.health_score.value(),
        }),
    )
    .from_job(job.id);
    Some(notification)
}

/// Fills a document's sections from the AI generator, or from the
/// deterministic fallback when the generator fails.
pub struct GenerateHandler {
    deps: PipelineDeps,
}

impl GenerateHandler {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Content of this run. A redelivered job reuses the snapshot an earlier
    /// attempt already recorded instead of generating again.
    async fn content_for(
        &self,
        job: &Job,
        payload: &GeneratePayload,
        title: &str,
    ) -> PipelineResult<(DocumentContent, bool)> {
        let recorded = self
            .deps
            .records
            .versions
            .list_for_document(payload.document_id)
            .await?
            .into_iter()
            .find(|v| v.source_job_id == Some(job.id));
        if let Some(version) = recorded {
            debug!(document_id = %payload.document_id, job_id = %job.id, "reusing recorded snapshot");
            return Ok((version.content, false));
        }

        let sections: Vec<&str> = payload
            .doc_type
            .sections()
            .iter()
            .map(|kind| kind.as_str())
            .collect();
        let request = GenerationRequest::new(generation_prompt(
            payload.doc_type.label(),
            title,
            &sections,
            &payload.prompt,
        ))
        .with_system(GENERATION_SYSTEM);

        let (text, ai) = match generate_within(
            self.deps.generator.as_ref(),
            &request,
            self.deps.config.generation_timeout,
        )
        .await
        {
            Ok(text) => (text, true),
            Err(e) => {
                warn!(
                    document_id = %payload.document_id,
                    job_id = %job.id,
                    error = %e,
                    "generator failed, using fallback content"
                );
                (fallback_text(payload.doc_type, title, &payload.prompt), false)
            }
        };
        Ok((map_sections(payload.doc_type, &text), ai))
    }
}

#[async_trait]
impl JobHandler for GenerateHandler {
    const TOPIC: Topic = Topic::Generate;
    type Payload = GeneratePayload;

    async fn handle(&self, job: &Job, payload: GeneratePayload) -> PipelineResult<()> {
        let documents = self.deps.records.documents.as_ref();
        let doc = match begin_run(documents, payload.document_id, payload.user_id, job.id).await? {
            RunStart::Proceed(doc) => doc,
            RunStart::Done(doc) => {
                debug!(document_id = %payload.document_id, job_id = %job.id, "run already finished");
                return announce_completion(&self.deps, job, &doc, &NOTICES).await;
            }
        };

        let (content, ai) = self.content_for(job, &payload, &doc.title).await?;
        let score = generation_health_score(content.len());

        self.deps
            .records
            .versions
            .append_once(DocumentVersion::generated(
                payload.document_id,
                content.clone(),
                payload.user_id,
                job.id,
            ))
            .await?;

        let doc = complete_run(documents, payload.document_id, job.id, |doc| {
            doc.doc_type = payload.doc_type;
            doc.content = content.clone();
            doc.health_score = score;
        })
        .await?;
        announce_completion(&self.deps, job, &doc, &NOTICES).await?;

        info!(
            document_id = %payload.document_id,
            job_id = %job.id,
            sections = content.len(),
            health_score = score.value(),
            ai,
            "document generated"
        );
        Ok(())
    }

    async fn on_terminal_failure(
        &self,
        job: &Job,
        payload: GeneratePayload,
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
    use std::time::Duration;

    use super::*;
    use folio_core::UserId;
    use folio_documents::{DocumentType, GeneratingStatus, SectionKind};

    use crate::config::PipelineConfig;
    use crate::pipeline::run::queue_run;
    use crate::pipeline::testing::{
        FlakyDocuments, RecordingMailer, ScriptedGenerator, StubProviders, claimed, deps_with,
        offline_deps, seed_document,
    };

    async fn queued_job(
        deps: &PipelineDeps,
        doc_type: DocumentType,
        prompt: &str,
    ) -> (Job, GeneratePayload) {
        let user = UserId::new();
        let doc = seed_document(&deps.records, user, doc_type, "Ada Lovelace").await;
        let payload = GeneratePayload {
            document_id: doc.id,
            doc_type,
            prompt: prompt.to_owned(),
            user_id: user,
        };
        let job = claimed(Topic::Generate, user, &payload);
        queue_run(deps.records.documents.as_ref(), doc.id, user, job.id)
            .await
            .unwrap();
        (job, payload)
    }

    #[tokio::test]
    async fn resume_falls_back_when_ai_is_down() {
        let deps = offline_deps();
        let (job, payload) = queued_job(&deps, DocumentType::Resume, "Backend engineer. Rust.").await;
        let handler = GenerateHandler::new(deps.clone());

        handler.handle(&job, payload.clone()).await.unwrap();

        let doc = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();
        assert_eq!(doc.status.state, GeneratingStatus::Completed);
        let kinds: Vec<_> = doc.content.sections().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            [
                SectionKind::Summary,
                SectionKind::Experience,
                SectionKind::Education,
                SectionKind::Skills
            ]
        );
        assert_eq!(doc.health_score.value(), 48);

        let versions = deps.records.versions.list_for_document(doc.id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].label, "v1.0 (AI Generated)");

        let notes = deps.records.notifications.list_for_user(payload.user_id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::GenerationComplete);
    }

    #[tokio::test]
    async fn ai_lines_fill_sections_in_order() {
        let generator = Arc::new(ScriptedGenerator::replying("Hi there\nWelcome\nShort closing"));
        let deps = deps_with(
            generator.clone(),
            Arc::new(StubProviders::default()),
            Arc::new(RecordingMailer::default()),
        );
        let (job, payload) = queued_job(&deps, DocumentType::CoverLetter, "Warm").await;

        GenerateHandler::new(deps.clone())
            .handle(&job, payload.clone())
            .await
            .unwrap();

        let doc = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();
        assert_eq!(doc.content.get(SectionKind::Opening), Some("Hi there"));
        assert_eq!(doc.content.get(SectionKind::Closing), Some("Short closing"));
        assert_eq!(doc.health_score.value(), 36);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn redelivery_does_not_duplicate_side_effects() {
        let deps = offline_deps();
        let (job, payload) = queued_job(&deps, DocumentType::Portfolio, "Designer").await;
        let handler = GenerateHandler::new(deps.clone());

        handler.handle(&job, payload.clone()).await.unwrap();
        let first = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();
        handler.handle(&job, payload.clone()).await.unwrap();
        let second = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();

        assert_eq!(first.revision, second.revision);
        assert_eq!(
            deps.records.versions.list_for_document(payload.document_id).await.unwrap().len(),
            1
        );
        assert_eq!(
            deps.records.notifications.list_for_user(payload.user_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn job_for_another_run_conflicts() {
        let deps = offline_deps();
        let (_job, payload) = queued_job(&deps, DocumentType::Resume, "x").await;
        let stray = claimed(Topic::Generate, payload.user_id, &payload);

        let err = GenerateHandler::new(deps)
            .handle(&stray, payload)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));
    }

    #[tokio::test]
    async fn terminal_failure_marks_document_failed() {
        let deps = offline_deps();
        let (job, payload) = queued_job(&deps, DocumentType::Resume, "x").await;
        let handler = GenerateHandler::new(deps.clone());

        let error = PipelineError::Persistence("disk full".into());
        handler
            .on_terminal_failure(&job, payload.clone(), &error)
            .await
            .unwrap();

        let doc = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();
        assert_eq!(doc.status.state, GeneratingStatus::Failed);
        assert!(doc.status.message.unwrap().contains("disk full"));
        let notes = deps.records.notifications.list_for_user(payload.user_id).await.unwrap();
        assert_eq!(notes[0].kind, NotificationKind::GenerationFailed);
    }

    #[tokio::test]
    async fn failed_completion_save_reports_only_the_failure() {
        let mut deps = offline_deps();
        // queue and begin save; the completion save is refused
        deps.records.documents = Arc::new(FlakyDocuments::failing_after(2));
        let (job, payload) = queued_job(&deps, DocumentType::Resume, "x").await;
        let handler = GenerateHandler::new(deps.clone());

        let error = handler.handle(&job, payload.clone()).await.unwrap_err();
        handler
            .on_terminal_failure(&job, payload.clone(), &error)
            .await
            .unwrap();

        let notes = deps.records.notifications.list_for_user(payload.user_id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::GenerationFailed);
    }

    #[tokio::test]
    async fn giving_up_after_completion_keeps_the_success() {
        let deps = offline_deps();
        let (job, payload) = queued_job(&deps, DocumentType::Resume, "x").await;
        let handler = GenerateHandler::new(deps.clone());
        handler.handle(&job, payload.clone()).await.unwrap();

        let error = PipelineError::Persistence("notification sink down".into());
        handler
            .on_terminal_failure(&job, payload.clone(), &error)
            .await
            .unwrap();

        let doc = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();
        assert_eq!(doc.status.state, GeneratingStatus::Completed);
        let notes = deps.records.notifications.list_for_user(payload.user_id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::GenerationComplete);
    }

    #[tokio::test]
    async fn redelivery_announces_a_completed_run() {
        let deps = offline_deps();
        let (job, payload) = queued_job(&deps, DocumentType::CoverLetter, "x").await;
        let documents = deps.records.documents.as_ref();
        // completed, but the worker died before notifying
        begin_run(documents, payload.document_id, payload.user_id, job.id)
            .await
            .unwrap();
        complete_run(documents, payload.document_id, job.id, |_| {})
            .await
            .unwrap();

        GenerateHandler::new(deps.clone())
            .handle(&job, payload.clone())
            .await
            .unwrap();

        let notes = deps.records.notifications.list_for_user(payload.user_id).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::GenerationComplete);
        assert_eq!(notes[0].title, "Your cover letter is ready");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generator_falls_back_instead_of_failing() {
        let generator = Arc::new(ScriptedGenerator::replying_after(
            "Too late\nNever used",
            Duration::from_secs(60),
        ));
        let mut deps = deps_with(
            generator.clone(),
            Arc::new(StubProviders::default()),
            Arc::new(RecordingMailer::default()),
        );
        deps.config = Arc::new(PipelineConfig {
            generation_timeout: Duration::from_secs(1),
            ..PipelineConfig::default()
        });
        let (job, payload) = queued_job(&deps, DocumentType::Resume, "Backend engineer.").await;

        GenerateHandler::new(deps.clone())
            .handle(&job, payload.clone())
            .await
            .unwrap();

        assert_eq!(generator.calls(), 1);
        let doc = deps.records.documents.get(payload.document_id).await.unwrap().unwrap();
        assert_eq!(doc.status.state, GeneratingStatus::Completed);
        assert_eq!(doc.content.len(), 4);
        assert_eq!(doc.health_score.value(), 48);
        assert!(doc.content.sections().iter().all(|s| !s.body.contains("Too late")));
    }
}
