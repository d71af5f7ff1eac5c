//! User-visible job outcomes, read by client polling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use folio_core::{JobId, NotificationId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    GenerationComplete,
    GenerationFailed,
    DuplicateReady,
    CritiqueReady,
    AtsScanReady,
    SeoAuditReady,
    ImportReady,
    ImportFailed,
    PublishLive,
    PublishFailed,
    AnalysisFailed,
    Billing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub payload: Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    /// Job that emitted it. A sink keeps at most one notification per
    /// `(source_job_id, kind)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_job_id: Option<JobId>,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            kind,
            title: title.into(),
            payload,
            read: false,
            created_at: Utc::now(),
            source_job_id: None,
        }
    }

    pub fn from_job(mut self, job_id: JobId) -> Self {
        self.source_job_id = Some(job_id);
        self
    }

    pub fn dedup_key(&self) -> Option<(JobId, NotificationKind)> {
        self.source_job_id.map(|job| (job, self.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_kind_as_type() {
        let n = Notification::new(
            UserId::new(),
            NotificationKind::CritiqueReady,
            "Critique ready: 72/100",
            json!({ "overall": 72 }),
        );
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "critique_ready");
        assert_eq!(value["read"], false);
        assert!(value.get("sourceJobId").is_none());
    }

    #[test]
    fn dedup_key_requires_a_source_job() {
        let job = JobId::new();
        let n = Notification::new(UserId::new(), NotificationKind::Billing, "t", Value::Null);
        assert!(n.dedup_key().is_none());
        assert_eq!(
            n.from_job(job).dedup_key(),
            Some((job, NotificationKind::Billing))
        );
    }
}
