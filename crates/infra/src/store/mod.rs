//! Record stores the pipeline reads and writes: the documents carrying the
//! status state machine, version snapshots, the notification sink, import
//! runs and publish targets.

mod in_memory;

use async_trait::async_trait;

use folio_core::{
    DocumentId, ExpectedVersion, ImportRunId, NotificationId, PublishTargetId, UserId,
};
use folio_documents::{Document, DocumentVersion, ImportRun, Notification, PublishTarget};

pub use in_memory::{
    InMemoryDocumentStore, InMemoryImportRunStore, InMemoryNotificationSink,
    InMemoryPublishTargetStore, InMemoryVersionStore,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    /// Optimistic concurrency or uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Documents, including their embedded `JobStatus`.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, id: DocumentId) -> StoreResult<Option<Document>>;

    /// Insert a new document; `Conflict` if the id is taken.
    async fn insert(&self, document: Document) -> StoreResult<Document>;

    /// Write `document` if the stored revision matches `expected`. Returns the
    /// stored copy with its revision bumped.
    async fn save(&self, document: &Document, expected: ExpectedVersion) -> StoreResult<Document>;
}

#[async_trait]
pub trait VersionStore: Send + Sync + 'static {
    /// Append unless a snapshot with the same `(document, source job)` key
    /// exists. Returns whether a row was written.
    async fn append_once(&self, version: DocumentVersion) -> StoreResult<bool>;

    async fn list_for_document(&self, document_id: DocumentId) -> StoreResult<Vec<DocumentVersion>>;
}

/// Append-only notification records; only the `read` flag ever changes.
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    /// Append unless one with the same `(source job, kind)` exists. Returns
    /// whether a row was written.
    async fn append(&self, notification: Notification) -> StoreResult<bool>;

    /// Newest first.
    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<Notification>>;

    /// Idempotent. `NotFound` when the notification is not the user's.
    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> StoreResult<Notification>;
}

#[async_trait]
pub trait ImportRunStore: Send + Sync + 'static {
    async fn get(&self, id: ImportRunId) -> StoreResult<Option<ImportRun>>;

    async fn insert(&self, run: ImportRun) -> StoreResult<()>;

    async fn save(&self, run: &ImportRun) -> StoreResult<()>;
}

#[async_trait]
pub trait PublishTargetStore: Send + Sync + 'static {
    async fn get(&self, id: PublishTargetId) -> StoreResult<Option<PublishTarget>>;

    async fn find_by_document(&self, document_id: DocumentId) -> StoreResult<Option<PublishTarget>>;

    async fn find_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<PublishTarget>>;

    /// Insert or replace by id. `Conflict` if the subdomain is bound to a
    /// different document.
    async fn upsert(&self, target: &PublishTarget) -> StoreResult<()>;
}
