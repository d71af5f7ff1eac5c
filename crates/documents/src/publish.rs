//! Binding of a document to a public subdomain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{DocumentId, DomainError, DomainResult, PublishTargetId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishTarget {
    pub id: PublishTargetId,
    pub document_id: DocumentId,
    pub owner_id: UserId,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub is_active: bool,
    pub published_at: Option<DateTime<Utc>>,
}

impl PublishTarget {
    /// Inactive binding created by the producer; the publish job activates it.
    pub fn pending(
        document_id: DocumentId,
        owner_id: UserId,
        subdomain: impl Into<String>,
        custom_domain: Option<String>,
    ) -> Self {
        Self {
            id: PublishTargetId::new(),
            document_id,
            owner_id,
            subdomain: subdomain.into(),
            custom_domain,
            is_active: false,
            published_at: None,
        }
    }

    /// `https://<custom domain>` when one is bound, else
    /// `https://<subdomain>.<base_domain>`.
    pub fn public_url(&self, base_domain: &str) -> String {
        match self.custom_domain.as_deref().filter(|d| !d.is_empty()) {
            Some(domain) => format!("https://{domain}"),
            None => format!("https://{}.{}", self.subdomain, base_domain),
        }
    }

    /// Flip the binding live. Returns `false` if it already was; the original
    /// `published_at` is kept so repeated activation changes nothing.
    pub fn activate(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_active {
            return false;
        }
        self.is_active = true;
        self.published_at.get_or_insert(at);
        true
    }
}

/// `[a-z0-9-]{3,63}`, no leading or trailing hyphen.
pub fn validate_subdomain(subdomain: &str) -> DomainResult<()> {
    let len = subdomain.len();
    if !(3..=63).contains(&len) {
        return Err(DomainError::validation(
            "subdomain must be between 3 and 63 characters",
        ));
    }
    if !subdomain
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(DomainError::validation(
            "subdomain may only contain lowercase letters, digits and hyphens",
        ));
    }
    if subdomain.starts_with('-') || subdomain.ends_with('-') {
        return Err(DomainError::validation(
            "subdomain may not start or end with a hyphen",
        ));
    }
    Ok(())
}
