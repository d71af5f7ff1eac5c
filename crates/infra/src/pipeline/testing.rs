//! Fakes and fixtures shared by handler and end-to-end tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use folio_ai::{AiError, ContentGenerator, GenerationRequest};
use folio_core::{DocumentId, ExpectedVersion, UserId};
use folio_documents::{Document, DocumentType, NormalizedProfile, Provider};

use crate::config::PipelineConfig;
use crate::external::{Email, MailError, Mailer, ProviderClient, ProviderError};
use crate::jobs::{Job, Topic};
use crate::store::{DocumentStore, InMemoryDocumentStore, StoreError, StoreResult};

use super::{PipelineDeps, Records};

/// Generator that replies with fixed text, or fails when given none.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub(crate) fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_owned()),
            ..Self::default()
        }
    }

    /// Replies with `text`, but only after `delay`.
    pub(crate) fn replying_after(text: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying(text)
        }
    }

    pub(crate) fn failing() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().ok_or(AiError::Unavailable)
    }
}

/// Document store whose saves start failing after the first `healthy` ones.
pub(crate) struct FlakyDocuments {
    inner: InMemoryDocumentStore,
    healthy: usize,
    saves: AtomicUsize,
}

impl FlakyDocuments {
    pub(crate) fn failing_after(healthy: usize) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            healthy,
            saves: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyDocuments {
    async fn get(&self, id: DocumentId) -> StoreResult<Option<Document>> {
        self.inner.get(id).await
    }

    async fn insert(&self, document: Document) -> StoreResult<Document> {
        self.inner.insert(document).await
    }

    async fn save(&self, document: &Document, expected: ExpectedVersion) -> StoreResult<Document> {
        if self.saves.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(StoreError::Storage("connection reset".into()));
        }
        self.inner.save(document, expected).await
    }
}

/// Provider client serving canned profiles; providers without one fail.
#[derive(Default)]
pub(crate) struct StubProviders {
    profiles: HashMap<Provider, NormalizedProfile>,
}

impl StubProviders {
    pub(crate) fn with(mut self, provider: Provider, profile: NormalizedProfile) -> Self {
        self.profiles.insert(provider, profile);
        self
    }
}

#[async_trait]
impl ProviderClient for StubProviders {
    async fn fetch_profile(
        &self,
        provider: Provider,
        _token: &str,
    ) -> Result<NormalizedProfile, ProviderError> {
        self.profiles
            .get(&provider)
            .cloned()
            .ok_or(ProviderError::Status {
                provider,
                status: 503,
            })
    }
}

#[derive(Default)]
pub(crate) struct RecordingMailer {
    pub(crate) sent: Mutex<Vec<Email>>,
    pub(crate) fail: bool,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError("smtp relay refused".into()));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

pub(crate) fn deps_with(
    generator: Arc<dyn ContentGenerator>,
    providers: Arc<dyn ProviderClient>,
    mailer: Arc<dyn Mailer>,
) -> PipelineDeps {
    PipelineDeps {
        records: Records::in_memory(),
        generator,
        providers,
        mailer,
        config: Arc::new(PipelineConfig::default()),
    }
}

/// AI unavailable, no providers, mail accepted.
pub(crate) fn offline_deps() -> PipelineDeps {
    deps_with(
        Arc::new(ScriptedGenerator::failing()),
        Arc::new(StubProviders::default()),
        Arc::new(RecordingMailer::default()),
    )
}

pub(crate) async fn seed_document(
    records: &Records,
    owner: UserId,
    doc_type: DocumentType,
    title: &str,
) -> Document {
    let doc = Document::new(DocumentId::new(), owner, doc_type, title);
    records.documents.insert(doc).await.unwrap()
}

/// A job as a worker would see it after claiming.
pub(crate) fn claimed<P: Serialize>(topic: Topic, user: UserId, payload: &P) -> Job {
    let mut job = Job::new(topic, user, serde_json::to_value(payload).unwrap());
    job.mark_running(std::time::Duration::from_secs(60));
    job
}
