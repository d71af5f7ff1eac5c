use std::collections::BTreeMap;
use std::str::FromStr;

use axum::http::StatusCode;
use serde::Deserialize;

use folio_core::UserId;
use folio_documents::{DocumentType, SeoMetadata};
use folio_infra::pipeline::BillingEvent;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    #[serde(default)]
    pub seo: SeoMetadata,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsScanRequest {
    #[serde(default)]
    pub job_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub subdomain: String,
    #[serde(default)]
    pub custom_domain: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImportRequest {
    pub providers: Vec<String>,
    #[serde(default)]
    pub oauth_tokens: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingEventRequest {
    pub user_id: UserId,
    pub event: BillingEvent,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub days_remaining: Option<u32>,
}

// -------------------------
// Path parsing
// -------------------------

pub fn parse_id<T: FromStr>(raw: &str, what: &'static str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
