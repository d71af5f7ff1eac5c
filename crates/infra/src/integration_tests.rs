//! End-to-end tests for the content-processing pipeline.
//!
//! Tests: Producer → JobQueue → WorkerPool → handlers → stores → polling
//!
//! Verifies:
//! - Runs move through queued → processing → completed as the client polls
//! - Redelivered jobs converge on the same state without duplicate records
//! - Terminal failures leave the owning record failed with a message

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use folio_core::{DocumentId, UserId};
    use folio_documents::{
        DocumentType, GeneratingStatus, NormalizedProfile, NotificationKind, Provider,
    };

    use crate::error::PipelineError;
    use crate::jobs::{InMemoryJobQueue, Job, JobHandler, JobQueue, RetryPolicy, Topic, WorkerConfig, WorkerPool};
    use crate::pipeline::testing::{
        RecordingMailer, ScriptedGenerator, StubProviders, deps_with, offline_deps, seed_document,
    };
    use crate::pipeline::{
        GenerateHandler, GeneratePayload, JobProducer, PipelineDeps, StatusReader,
        register_handlers,
    };

    struct Harness {
        deps: PipelineDeps,
        queue: Arc<InMemoryJobQueue>,
        producer: JobProducer,
        reader: StatusReader,
        pool: WorkerPool,
    }

    fn harness(deps: PipelineDeps) -> Harness {
        let queue = Arc::new(InMemoryJobQueue::new());
        let producer = JobProducer::new(deps.records.clone(), queue.clone(), RetryPolicy::default());
        let reader = StatusReader::new(deps.records.clone());
        let mut pool = WorkerPool::new(queue.clone());
        register_handlers(&mut pool, &deps);
        Harness {
            deps,
            queue,
            producer,
            reader,
            pool,
        }
    }

    #[tokio::test]
    async fn resume_generation_with_ai_down_completes_with_fallback() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let doc = seed_document(&h.deps.records, user, DocumentType::Resume, "Ada Lovelace").await;

        let receipt = h
            .producer
            .request_generate(user, doc.id, "Analytical engine programmer.")
            .await
            .unwrap();
        assert_eq!(h.reader.document_status(user, doc.id).await.unwrap().status, "queued");

        assert_eq!(h.pool.drain().await.unwrap(), 1);

        let view = h.reader.document_status(user, doc.id).await.unwrap();
        assert_eq!(view.status, "completed");
        assert_eq!(view.job_id, Some(receipt.job_id));

        let doc = h.deps.records.documents.get(doc.id).await.unwrap().unwrap();
        assert_eq!(doc.content.len(), 4);
        assert_eq!(doc.health_score.value(), 48);

        let notes = h.reader.notifications(user).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::GenerationComplete);
        assert_eq!(h.pool.stats().jobs_succeeded, 1);
    }

    #[tokio::test]
    async fn analysis_jobs_run_back_to_back() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let doc = seed_document(&h.deps.records, user, DocumentType::Portfolio, "Site").await;

        h.producer
            .request_ats_scan(user, doc.id, Some("Senior Rust engineer".into()))
            .await
            .unwrap();
        let err = h.producer.request_seo_audit(user, doc.id).await.unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));

        h.pool.drain().await.unwrap();
        h.producer.request_seo_audit(user, doc.id).await.unwrap();
        h.pool.drain().await.unwrap();
        h.producer.request_critique(user, doc.id).await.unwrap();
        h.pool.drain().await.unwrap();

        let doc = h.deps.records.documents.get(doc.id).await.unwrap().unwrap();
        assert!(doc.analysis.ats.is_some());
        assert!(doc.analysis.seo.is_some());
        let critique = doc.analysis.critique.unwrap();
        assert_eq!(doc.health_score.value(), critique.overall);
        assert_eq!(doc.status.state, GeneratingStatus::Completed);

        let kinds: Vec<_> = h
            .reader
            .notifications(user)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&NotificationKind::AtsScanReady));
        assert!(kinds.contains(&NotificationKind::SeoAuditReady));
        assert!(kinds.contains(&NotificationKind::CritiqueReady));
    }

    #[tokio::test]
    async fn import_merges_profiles_and_reports_progress() {
        let providers = StubProviders::default()
            .with(
                Provider::Github,
                NormalizedProfile {
                    name: Some("Ada".into()),
                    skills: vec!["rust".into(), "math".into()],
                    ..NormalizedProfile::default()
                },
            )
            .with(
                Provider::Linkedin,
                NormalizedProfile {
                    name: Some("Ada Lovelace".into()),
                    headline: Some("Programmer".into()),
                    skills: vec!["math".into(), "writing".into()],
                    ..NormalizedProfile::default()
                },
            );
        let h = harness(deps_with(
            Arc::new(ScriptedGenerator::failing()),
            Arc::new(providers),
            Arc::new(RecordingMailer::default()),
        ));
        let user = UserId::new();

        let tokens = BTreeMap::from([
            ("github".to_string(), "gh".to_string()),
            ("linkedin".to_string(), "li".to_string()),
        ]);
        let receipt = h
            .producer
            .start_import(user, &["github".into(), "linkedin".into()], &tokens)
            .await
            .unwrap();
        let run_id = receipt.import_run_id.unwrap();
        let view = h.reader.import_status(user, run_id).await.unwrap();
        assert_eq!((view.status, view.progress_pct), ("queued", Some(0)));

        h.pool.drain().await.unwrap();

        let view = h.reader.import_status(user, run_id).await.unwrap();
        assert_eq!((view.status, view.progress_pct), ("completed", Some(100)));
        let run = h.deps.records.imports.get(run_id).await.unwrap().unwrap();
        let merged = run.merged.unwrap();
        assert_eq!(merged.name.as_deref(), Some("Ada"));
        assert_eq!(merged.headline.as_deref(), Some("Programmer"));
        assert_eq!(merged.skills, ["rust", "math", "writing"]);
    }

    #[tokio::test]
    async fn publish_survives_redelivery() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let doc = seed_document(&h.deps.records, user, DocumentType::Portfolio, "Site").await;

        let receipt = h
            .producer
            .request_publish(user, doc.id, "ada", Some("Ada.Dev".into()), "folio.site")
            .await
            .unwrap();
        h.pool.drain().await.unwrap();

        let job = h.queue.get(receipt.job_id).await.unwrap().unwrap();
        h.pool.execute(job).await.unwrap();

        let doc = h.deps.records.documents.get(doc.id).await.unwrap().unwrap();
        assert!(doc.is_public);
        assert_eq!(doc.public_url.as_deref(), Some("https://ada.dev"));
        let target = h
            .deps
            .records
            .publish_targets
            .find_by_document(doc.id)
            .await
            .unwrap()
            .unwrap();
        assert!(target.is_active);
        assert!(target.published_at.is_some());
        assert_eq!(h.reader.notifications(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expired_lease_redelivers_without_duplicates() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let doc = seed_document(&h.deps.records, user, DocumentType::CoverLetter, "Letter").await;
        h.producer.request_generate(user, doc.id, "Warm").await.unwrap();

        // A worker claims the job, does all the work, and dies before acking.
        let job = h
            .queue
            .claim_next(Topic::Generate, Duration::ZERO)
            .await
            .unwrap()
            .unwrap();
        let payload: GeneratePayload = serde_json::from_value(job.payload.clone()).unwrap();
        GenerateHandler::new(h.deps.clone())
            .handle(&job, payload)
            .await
            .unwrap();

        assert_eq!(h.pool.drain().await.unwrap(), 1);

        let redelivered = h.queue.get(job.id).await.unwrap().unwrap();
        assert_eq!(redelivered.attempt, 2);
        assert_eq!(redelivered.state.as_str(), "completed");
        assert_eq!(
            h.deps.records.versions.list_for_document(doc.id).await.unwrap().len(),
            1
        );
        assert_eq!(h.reader.notifications(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_document_dead_letters_and_notifies() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let payload = GeneratePayload {
            document_id: DocumentId::new(),
            doc_type: DocumentType::Resume,
            prompt: "x".into(),
            user_id: user,
        };
        let job = Job::new(Topic::Generate, user, serde_json::to_value(&payload).unwrap());
        let job_id = h.queue.enqueue(job).await.unwrap();

        h.pool.drain().await.unwrap();

        let dead = h.queue.list_dead_letters(10).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job.id, job_id);
        assert_eq!(dead[0].job.attempt, 1);
        let notes = h.reader.notifications(user).await.unwrap();
        assert_eq!(notes[0].kind, NotificationKind::GenerationFailed);
    }

    #[tokio::test]
    async fn undecodable_payload_is_dead_lettered_quietly() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let job = Job::new(Topic::Critique, user, serde_json::json!({ "documentId": 7 }));
        h.queue.enqueue(job).await.unwrap();

        h.pool.drain().await.unwrap();

        assert_eq!(h.queue.list_dead_letters(10).await.unwrap().len(), 1);
        assert!(h.reader.notifications(user).await.unwrap().is_empty());
        assert_eq!(h.pool.stats().jobs_dead_lettered, 1);
    }

    #[tokio::test]
    async fn spawned_workers_complete_billing_and_generation() {
        let h = harness(offline_deps());
        let user = UserId::new();
        let doc = seed_document(&h.deps.records, user, DocumentType::Portfolio, "Site").await;

        let handle = h.pool.spawn(
            WorkerConfig::default()
                .with_poll_interval(Duration::from_millis(10))
                .with_max_concurrent(2),
        );
        h.producer.request_generate(user, doc.id, "Designer").await.unwrap();
        h.producer
            .notify_billing(user, crate::pipeline::BillingEvent::Upgraded, Some("pro".into()), None)
            .await
            .unwrap();

        let mut done = false;
        for _ in 0..200 {
            let status = h.reader.document_status(user, doc.id).await.unwrap().status;
            let notes = h.reader.notifications(user).await.unwrap().len();
            if status == "completed" && notes == 2 {
                done = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;
        assert!(done, "jobs did not finish in time");
    }
}
