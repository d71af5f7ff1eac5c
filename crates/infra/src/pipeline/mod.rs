//! The content-processing pipeline: producer, status polling, and one
//! handler per topic, wired over the job queue and the record stores.

pub mod handlers;
pub mod payloads;
pub mod polling;
pub mod producer;
mod run;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use folio_ai::ContentGenerator;

use crate::config::PipelineConfig;
use crate::external::{Mailer, ProviderClient};
use crate::jobs::WorkerPool;
use crate::store::{
    DocumentStore, ImportRunStore, InMemoryDocumentStore, InMemoryImportRunStore,
    InMemoryNotificationSink, InMemoryPublishTargetStore, InMemoryVersionStore, NotificationSink,
    PublishTargetStore, VersionStore,
};

pub use handlers::{
    AtsScanHandler, BillingNotifyHandler, CritiqueHandler, DuplicateHandler, GenerateHandler,
    ImportUnifyHandler, PublishHandler, SeoAuditHandler,
};
pub use payloads::{
    AnalysisPayload, BillingEvent, BillingPayload, DuplicatePayload, GeneratePayload,
    ImportPayload, PublishPayload,
};
pub use polling::{StatusReader, StatusView};
pub use producer::{Enqueued, JobProducer, MAX_PROMPT_CHARS};

/// Every record store the pipeline touches.
#[derive(Clone)]
pub struct Records {
    pub documents: Arc<dyn DocumentStore>,
    pub versions: Arc<dyn VersionStore>,
    pub notifications: Arc<dyn NotificationSink>,
    pub imports: Arc<dyn ImportRunStore>,
    pub publish_targets: Arc<dyn PublishTargetStore>,
}

impl Records {
    pub fn in_memory() -> Self {
        Self {
            documents: Arc::new(InMemoryDocumentStore::new()),
            versions: Arc::new(InMemoryVersionStore::new()),
            notifications: Arc::new(InMemoryNotificationSink::new()),
            imports: Arc::new(InMemoryImportRunStore::new()),
            publish_targets: Arc::new(InMemoryPublishTargetStore::new()),
        }
    }
}

/// Collaborators shared by all handlers.
#[derive(Clone)]
pub struct PipelineDeps {
    pub records: Records,
    pub generator: Arc<dyn ContentGenerator>,
    pub providers: Arc<dyn ProviderClient>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<PipelineConfig>,
}

/// Register the handler of every topic on `pool`.
pub fn register_handlers(pool: &mut WorkerPool, deps: &PipelineDeps) {
    pool.register(GenerateHandler::new(deps.clone()))
        .register(DuplicateHandler::new(deps.clone()))
        .register(CritiqueHandler::new(deps.clone()))
        .register(AtsScanHandler::new(deps.clone()))
        .register(SeoAuditHandler::new(deps.clone()))
        .register(ImportUnifyHandler::new(deps.clone()))
        .register(PublishHandler::new(deps.clone()))
        .register(BillingNotifyHandler::new(deps.clone()));
}
