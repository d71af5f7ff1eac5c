//! In-memory stores for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use folio_core::{
    DocumentId, ExpectedVersion, ImportRunId, NotificationId, PublishTargetId, UserId,
};
use folio_documents::{Document, DocumentVersion, ImportRun, Notification, PublishTarget};

use super::{
    DocumentStore, ImportRunStore, NotificationSink, PublishTargetStore, StoreError, StoreResult,
    VersionStore,
};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("store lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: DocumentId) -> StoreResult<Option<Document>> {
        Ok(self.documents.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn insert(&self, mut document: Document) -> StoreResult<Document> {
        let mut documents = self.documents.write().map_err(poisoned)?;
        if documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(format!(
                "document {} already exists",
                document.id
            )));
        }
        document.revision = 1;
        documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn save(&self, document: &Document, expected: ExpectedVersion) -> StoreResult<Document> {
        let mut documents = self.documents.write().map_err(poisoned)?;
        let current = documents
            .get_mut(&document.id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document.id)))?;

        expected
            .check(current.revision)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        let mut stored = document.clone();
        stored.revision = current.revision + 1;
        stored.updated_at = Utc::now();
        *current = stored.clone();
        Ok(stored)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryVersionStore {
    versions: RwLock<Vec<DocumentVersion>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn append_once(&self, version: DocumentVersion) -> StoreResult<bool> {
        let mut versions = self.versions.write().map_err(poisoned)?;
        if let Some(key) = version.job_key() {
            if versions.iter().any(|v| v.job_key() == Some(key)) {
                return Ok(false);
            }
        }
        versions.push(version);
        Ok(true)
    }

    async fn list_for_document(&self, document_id: DocumentId) -> StoreResult<Vec<DocumentVersion>> {
        let versions = self.versions.read().map_err(poisoned)?;
        Ok(versions
            .iter()
            .filter(|v| v.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryNotificationSink {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn append(&self, notification: Notification) -> StoreResult<bool> {
        let mut notifications = self.notifications.write().map_err(poisoned)?;
        if let Some(key) = notification.dedup_key() {
            if notifications.iter().any(|n| n.dedup_key() == Some(key)) {
                return Ok(false);
            }
        }
        notifications.push(notification);
        Ok(true)
    }

    async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<Notification>> {
        let notifications = self.notifications.read().map_err(poisoned)?;
        // Appended in time order, so reversing yields newest first.
        Ok(notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> StoreResult<Notification> {
        let mut notifications = self.notifications.write().map_err(poisoned)?;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))?;
        notification.read = true;
        Ok(notification.clone())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryImportRunStore {
    runs: RwLock<HashMap<ImportRunId, ImportRun>>,
}

impl InMemoryImportRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportRunStore for InMemoryImportRunStore {
    async fn get(&self, id: ImportRunId) -> StoreResult<Option<ImportRun>> {
        Ok(self.runs.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn insert(&self, run: ImportRun) -> StoreResult<()> {
        let mut runs = self.runs.write().map_err(poisoned)?;
        if runs.contains_key(&run.id) {
            return Err(StoreError::Conflict(format!("import run {} already exists", run.id)));
        }
        runs.insert(run.id, run);
        Ok(())
    }

    async fn save(&self, run: &ImportRun) -> StoreResult<()> {
        let mut runs = self.runs.write().map_err(poisoned)?;
        match runs.get_mut(&run.id) {
            Some(slot) => {
                *slot = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("import run {}", run.id))),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPublishTargetStore {
    targets: RwLock<HashMap<PublishTargetId, PublishTarget>>,
}

impl InMemoryPublishTargetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PublishTargetStore for InMemoryPublishTargetStore {
    async fn get(&self, id: PublishTargetId) -> StoreResult<Option<PublishTarget>> {
        Ok(self.targets.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn find_by_document(&self, document_id: DocumentId) -> StoreResult<Option<PublishTarget>> {
        let targets = self.targets.read().map_err(poisoned)?;
        Ok(targets
            .values()
            .find(|t| t.document_id == document_id)
            .cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<PublishTarget>> {
        let targets = self.targets.read().map_err(poisoned)?;
        Ok(targets.values().find(|t| t.subdomain == subdomain).cloned())
    }

    async fn upsert(&self, target: &PublishTarget) -> StoreResult<()> {
        let mut targets = self.targets.write().map_err(poisoned)?;
        let taken = targets
            .values()
            .any(|t| t.subdomain == target.subdomain && t.document_id != target.document_id);
        if taken {
            return Err(StoreError::Conflict(format!(
                "subdomain {} is already taken",
                target.subdomain
            )));
        }
        targets.insert(target.id, target.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::JobId;
    use folio_documents::{DocumentContent, DocumentType, NotificationKind};

    fn document() -> Document {
        Document::new(DocumentId::new(), UserId::new(), DocumentType::Resume, "CV")
    }

    #[tokio::test]
    async fn save_bumps_revision_and_rejects_stale_writes() {
        let store = InMemoryDocumentStore::new();
        let doc = store.insert(document()).await.unwrap();
        assert_eq!(doc.revision, 1);

        let saved = store.save(&doc, ExpectedVersion::Exact(1)).await.unwrap();
        assert_eq!(saved.revision, 2);

        let stale = store.save(&doc, ExpectedVersion::Exact(1)).await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn version_append_is_guarded_by_job() {
        let store = InMemoryVersionStore::new();
        let doc_id = DocumentId::new();
        let job = JobId::new();
        let snapshot =
            || DocumentVersion::generated(doc_id, DocumentContent::default(), UserId::new(), job);

        assert!(store.append_once(snapshot()).await.unwrap());
        assert!(!store.append_once(snapshot()).await.unwrap());
        assert_eq!(store.list_for_document(doc_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notifications_dedup_and_mark_read() {
        let sink = InMemoryNotificationSink::new();
        let user = UserId::new();
        let job = JobId::new();
        let make = |title: &str| {
            Notification::new(user, NotificationKind::CritiqueReady, title, serde_json::Value::Null)
                .from_job(job)
        };

        assert!(sink.append(make("first")).await.unwrap());
        assert!(!sink.append(make("again")).await.unwrap());
        let later = Notification::new(user, NotificationKind::Billing, "later", serde_json::Value::Null);
        sink.append(later).await.unwrap();

        let listed = sink.list_for_user(user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "later");

        let id = listed[1].id;
        assert!(sink.mark_read(user, id).await.unwrap().read);
        assert!(sink.mark_read(user, id).await.unwrap().read);
        assert!(matches!(
            sink.mark_read(UserId::new(), id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subdomain_is_unique_across_documents() {
        let store = InMemoryPublishTargetStore::new();
        let owner = UserId::new();
        let first = PublishTarget::pending(DocumentId::new(), owner, "ada", None);
        store.upsert(&first).await.unwrap();

        let other = PublishTarget::pending(DocumentId::new(), owner, "ada", None);
        assert!(matches!(store.upsert(&other).await, Err(StoreError::Conflict(_))));

        let mut rebound = first.clone();
        rebound.custom_domain = Some("ada.dev".into());
        store.upsert(&rebound).await.unwrap();
        assert_eq!(
            store.find_by_subdomain("ada").await.unwrap().unwrap().custom_domain.as_deref(),
            Some("ada.dev")
        );
    }
}
