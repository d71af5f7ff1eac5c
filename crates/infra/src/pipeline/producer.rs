//! Job producer: validates a request, writes the provisional state that
//! polling reads, and enqueues the job.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use folio_core::{DocumentId, ImportRunId, JobId, UserId};
use folio_documents::{ImportRun, Provider, PublishTarget, validate_subdomain};

use crate::error::{PipelineError, PipelineResult};
use crate::jobs::{Job, JobQueue, RetryPolicy, Topic};

use super::Records;
use super::payloads::{
    AnalysisPayload, BillingEvent, BillingPayload, DuplicatePayload, GeneratePayload,
    ImportPayload, PublishPayload,
};
use super::run::{fail_run, load_owned, modify_document, queue_run};

/// Longest accepted generation prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// What the caller gets back from a request: enough to start polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enqueued {
    pub job_id: JobId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_run_id: Option<ImportRunId>,
}

impl Enqueued {
    fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            status: "queued",
            document_id: None,
            import_run_id: None,
        }
    }

    fn for_document(job_id: JobId, document_id: DocumentId) -> Self {
        Self {
            document_id: Some(document_id),
            ..Self::new(job_id)
        }
    }
}

pub struct JobProducer {
    records: Records,
    queue: Arc<dyn JobQueue>,
    retry: RetryPolicy,
}

impl JobProducer {
    pub fn new(records: Records, queue: Arc<dyn JobQueue>, retry: RetryPolicy) -> Self {
        Self {
            records,
            queue,
            retry,
        }
    }

    fn job<P: Serialize>(
        &self,
        id: JobId,
        topic: Topic,
        user_id: UserId,
        payload: &P,
    ) -> PipelineResult<Job> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| PipelineError::InvalidPayload(format!("{topic} payload: {e}")))?;
        Ok(Job::new(topic, user_id, payload)
            .with_id(id)
            .with_retry_policy(self.retry.clone()))
    }

    /// Enqueue a job that owns a document run. The run was already marked
    /// `queued`; if the queue refuses the job, the run is marked failed so it
    /// does not sit in `queued` forever.
    async fn enqueue_document_run(&self, job: Job, document_id: DocumentId) -> PipelineResult<()> {
        let job_id = job.id;
        let topic = job.topic;
        if let Err(e) = self.queue.enqueue(job).await {
            let message = format!("could not enqueue {topic} job: {e}");
            if let Err(mark) =
                fail_run(self.records.documents.as_ref(), document_id, job_id, &message).await
            {
                warn!(document_id = %document_id, %job_id, error = %mark, "failed to mark run failed");
            }
            return Err(e.into());
        }
        info!(document_id = %document_id, %job_id, %topic, "job enqueued");
        Ok(())
    }

    async fn request_analysis(
        &self,
        topic: Topic,
        user_id: UserId,
        document_id: DocumentId,
        job_description: Option<String>,
    ) -> PipelineResult<Enqueued> {
        let job_id = JobId::new();
        queue_run(self.records.documents.as_ref(), document_id, user_id, job_id).await?;
        let payload = AnalysisPayload {
            document_id,
            user_id,
            job_description: job_description.filter(|jd| !jd.trim().is_empty()),
        };
        let job = self.job(job_id, topic, user_id, &payload)?;
        self.enqueue_document_run(job, document_id).await?;
        Ok(Enqueued::for_document(job_id, document_id))
    }

    /// Request AI generation of a document's sections.
    #[instrument(skip(self, prompt), fields(%user_id, %document_id))]
    pub async fn request_generate(
        &self,
        user_id: UserId,
        document_id: DocumentId,
        prompt: &str,
    ) -> PipelineResult<Enqueued> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PipelineError::Validation("prompt must not be empty".into()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(PipelineError::Validation(format!(
                "prompt exceeds {MAX_PROMPT_CHARS} characters"
            )));
        }

        let job_id = JobId::new();
        let doc = queue_run(self.records.documents.as_ref(), document_id, user_id, job_id).await?;
        let payload = GeneratePayload {
            document_id,
            doc_type: doc.doc_type,
            prompt: prompt.to_owned(),
            user_id,
        };
        let job = self.job(job_id, Topic::Generate, user_id, &payload)?;
        self.enqueue_document_run(job, document_id).await?;
        Ok(Enqueued::for_document(job_id, document_id))
    }

    /// Request a copy of a document. The source's run state is untouched;
    /// the returned `documentId` is the id the copy will have.
    #[instrument(skip(self), fields(%user_id, %document_id))]
    pub async fn request_duplicate(
        &self,
        user_id: UserId,
        document_id: DocumentId,
    ) -> PipelineResult<Enqueued> {
        load_owned(self.records.documents.as_ref(), document_id, user_id).await?;

        let job_id = JobId::new();
        let target_document_id = DocumentId::new();
        let payload = DuplicatePayload {
            document_id,
            user_id,
            target_document_id,
        };
        let job = self.job(job_id, Topic::Duplicate, user_id, &payload)?;
        self.queue.enqueue(job).await?;
        Ok(Enqueued::for_document(job_id, target_document_id))
    }

    #[instrument(skip(self), fields(%user_id, %document_id))]
    pub async fn request_critique(
        &self,
        user_id: UserId,
        document_id: DocumentId,
    ) -> PipelineResult<Enqueued> {
        self.request_analysis(Topic::Critique, user_id, document_id, None)
            .await
    }

    #[instrument(skip(self, job_description), fields(%user_id, %document_id))]
    pub async fn request_ats_scan(
        &self,
        user_id: UserId,
        document_id: DocumentId,
        job_description: Option<String>,
    ) -> PipelineResult<Enqueued> {
        self.request_analysis(Topic::AtsScan, user_id, document_id, job_description)
            .await
    }

    #[instrument(skip(self), fields(%user_id, %document_id))]
    pub async fn request_seo_audit(
        &self,
        user_id: UserId,
        document_id: DocumentId,
    ) -> PipelineResult<Enqueued> {
        self.request_analysis(Topic::SeoAudit, user_id, document_id, None)
            .await
    }

    /// Start a profile import from `providers`. Unknown provider names and
    /// tokens for providers not requested are rejected.
    #[instrument(skip(self, oauth_tokens), fields(%user_id))]
    pub async fn start_import(
        &self,
        user_id: UserId,
        providers: &[String],
        oauth_tokens: &BTreeMap<String, String>,
    ) -> PipelineResult<Enqueued> {
        let mut parsed: Vec<Provider> = Vec::with_capacity(providers.len());
        for name in providers {
            let provider: Provider = name.parse()?;
            if !parsed.contains(&provider) {
                parsed.push(provider);
            }
        }
        if parsed.is_empty() {
            return Err(PipelineError::Validation(
                "at least one provider is required".into(),
            ));
        }

        let mut tokens = BTreeMap::new();
        for (name, token) in oauth_tokens {
            let provider: Provider = name.parse()?;
            if !parsed.contains(&provider) {
                return Err(PipelineError::Validation(format!(
                    "token given for {provider}, which was not requested"
                )));
            }
            if !token.trim().is_empty() {
                tokens.insert(provider, token.clone());
            }
        }

        let job_id = JobId::new();
        let mut run = ImportRun::queued(user_id, parsed.clone());
        run.job_id = Some(job_id);
        self.records.imports.insert(run.clone()).await?;

        let payload = ImportPayload {
            import_run_id: run.id,
            user_id,
            providers: parsed,
            oauth_tokens: tokens,
        };
        let job = self.job(job_id, Topic::ImportUnify, user_id, &payload)?;
        if let Err(e) = self.queue.enqueue(job).await {
            if run.fail(format!("could not enqueue import job: {e}")).is_ok()
                && let Err(mark) = self.records.imports.save(&run).await
            {
                warn!(import_run_id = %run.id, error = %mark, "failed to mark import failed");
            }
            return Err(e.into());
        }
        info!(import_run_id = %run.id, %job_id, "import enqueued");
        Ok(Enqueued {
            import_run_id: Some(run.id),
            ..Enqueued::new(job_id)
        })
    }

    /// Bind a document to a subdomain and enqueue its activation. The
    /// binding is written inactive; the document's public URL is written
    /// ahead of the job so the client can show it immediately.
    #[instrument(skip(self), fields(%user_id, %document_id))]
    pub async fn request_publish(
        &self,
        user_id: UserId,
        document_id: DocumentId,
        subdomain: &str,
        custom_domain: Option<String>,
        base_domain: &str,
    ) -> PipelineResult<Enqueued> {
        let subdomain = subdomain.trim().to_ascii_lowercase();
        validate_subdomain(&subdomain)?;
        let custom_domain = custom_domain
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty());

        load_owned(self.records.documents.as_ref(), document_id, user_id).await?;

        let targets = &self.records.publish_targets;
        if let Some(holder) = targets.find_by_subdomain(&subdomain).await?
            && holder.document_id != document_id
        {
            return Err(PipelineError::Conflict(format!(
                "subdomain {subdomain} is already taken"
            )));
        }

        let target = match targets.find_by_document(document_id).await? {
            Some(existing)
                if existing.subdomain == subdomain && existing.custom_domain == custom_domain =>
            {
                existing
            }
            Some(existing) => PublishTarget {
                id: existing.id,
                ..PublishTarget::pending(document_id, user_id, subdomain.clone(), custom_domain)
            },
            None => PublishTarget::pending(document_id, user_id, subdomain.clone(), custom_domain),
        };
        targets.upsert(&target).await?;

        let url = target.public_url(base_domain);
        modify_document(self.records.documents.as_ref(), document_id, |doc| {
            doc.public_url = Some(url.clone());
            Ok(())
        })
        .await?;

        let job_id = JobId::new();
        let payload = PublishPayload {
            document_id,
            user_id,
            subdomain,
            custom_domain: target.custom_domain.clone(),
            target_id: target.id,
        };
        let job = self.job(job_id, Topic::Publish, user_id, &payload)?;
        self.queue.enqueue(job).await?;
        Ok(Enqueued::for_document(job_id, document_id))
    }

    /// Enqueue a billing notification for `user_id`.
    #[instrument(skip(self, tier), fields(%user_id))]
    pub async fn notify_billing(
        &self,
        user_id: UserId,
        event: BillingEvent,
        tier: Option<String>,
        days_remaining: Option<u32>,
    ) -> PipelineResult<Enqueued> {
        let job_id = JobId::new();
        let payload = BillingPayload {
            user_id,
            event,
            tier,
            days_remaining,
        };
        let job = self.job(job_id, Topic::BillingNotify, user_id, &payload)?;
        self.queue.enqueue(job).await?;
        Ok(Enqueued::new(job_id))
    }
}
