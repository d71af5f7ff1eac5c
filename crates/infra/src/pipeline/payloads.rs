//! Typed job payloads, one per topic. Field names are camelCase on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use folio_core::{DocumentId, ImportRunId, PublishTargetId, UserId};
use folio_documents::{DocumentType, Provider};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePayload {
    pub document_id: DocumentId,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub prompt: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePayload {
    pub document_id: DocumentId,
    pub user_id: UserId,
    /// Id the copy is created under; fixed by the producer so redelivery
    /// cannot create a second copy.
    pub target_document_id: DocumentId,
}

/// Payload of the critique, ats-scan and seo-audit topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    pub document_id: DocumentId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    pub import_run_id: ImportRunId,
    pub user_id: UserId,
    pub providers: Vec<Provider>,
    #[serde(default)]
    pub oauth_tokens: BTreeMap<Provider, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    pub document_id: DocumentId,
    pub user_id: UserId,
    pub subdomain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,
    pub target_id: PublishTargetId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingEvent {
    RenewalSuccess,
    RenewalFailed,
    TrialEnding,
    Cancelled,
    Upgraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingPayload {
    pub user_id: UserId,
    pub event: BillingEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<u32>,
}
