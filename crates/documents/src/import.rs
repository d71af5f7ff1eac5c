//! Multi-provider profile import: normalized profile shape, merge, and the
//! run record polled by the client.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use folio_core::{DocumentId, DomainError, DomainResult, ImportRunId, JobId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
    Linkedin,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
            Provider::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::Github),
            "gitlab" => Ok(Provider::Gitlab),
            "linkedin" => Ok(Provider::Linkedin),
            other => Err(DomainError::validation(format!("unknown provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub school: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub stars: u32,
}

/// Provider-independent profile shape every provider response is normalized
/// into before merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProfile {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

/// Merge profiles in input order.
///
/// Scalars keep the first non-empty value. Skills are concatenated and
/// de-duplicated by exact string, keeping first occurrence. Experience,
/// education and projects are concatenated as-is. Links are shallow-merged,
/// later profiles overwriting earlier keys.
pub fn merge_profiles<'a, I>(profiles: I) -> NormalizedProfile
where
    I: IntoIterator<Item = &'a NormalizedProfile>,
{
    let mut merged = NormalizedProfile::default();
    let mut seen_skills = HashSet::new();

    for profile in profiles {
        first_non_empty(&mut merged.name, &profile.name);
        first_non_empty(&mut merged.headline, &profile.headline);
        first_non_empty(&mut merged.bio, &profile.bio);

        for skill in &profile.skills {
            if seen_skills.insert(skill.as_str()) {
                merged.skills.push(skill.clone());
            }
        }
        merged.experience.extend(profile.experience.iter().cloned());
        merged.education.extend(profile.education.iter().cloned());
        merged.projects.extend(profile.projects.iter().cloned());
        merged
            .links
            .extend(profile.links.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    merged
}

fn first_non_empty(slot: &mut Option<String>, candidate: &Option<String>) {
    if slot.is_some() {
        return;
    }
    if let Some(value) = candidate.as_deref().filter(|v| !v.trim().is_empty()) {
        *slot = Some(value.to_owned());
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Queued => "queued",
            ImportStatus::Processing => "processing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ImportStatus::Completed | ImportStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRun {
    pub id: ImportRunId,
    pub user_id: UserId,
    pub providers: Vec<Provider>,
    pub status: ImportStatus,
    pub progress_pct: u8,
    pub message: Option<String>,
    /// Merged profile once the unify job finished.
    pub merged: Option<NormalizedProfile>,
    /// Set by the confirmation step outside the pipeline.
    pub draft_document_id: Option<DocumentId>,
    pub confirmed_payload: Option<Value>,
    pub job_id: Option<JobId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportRun {
    /// Run record the producer writes before enqueueing, so polling has
    /// something to read before a worker starts.
    pub fn queued(user_id: UserId, providers: Vec<Provider>) -> Self {
        let now = Utc::now();
        Self {
            id: ImportRunId::new(),
            user_id,
            providers,
            status: ImportStatus::Queued,
            progress_pct: 0,
            message: None,
            merged: None,
            draft_document_id: None,
            confirmed_payload: None,
            job_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn begin(&mut self) -> DomainResult<()> {
        match self.status {
            ImportStatus::Queued | ImportStatus::Processing => {
                self.status = ImportStatus::Processing;
                self.touch();
                Ok(())
            }
            other => Err(DomainError::invalid_transition(format!(
                "cannot begin import from {}",
                other.as_str()
            ))),
        }
    }

    /// Progress never moves backwards and stays below 100 until completion.
    pub fn set_progress(&mut self, pct: u8) {
        self.progress_pct = self.progress_pct.max(pct.min(99));
        self.touch();
    }

    pub fn complete(&mut self, merged: NormalizedProfile) -> DomainResult<()> {
        if self.status != ImportStatus::Processing {
            return Err(DomainError::invalid_transition(format!(
                "cannot complete import from {}",
                self.status.as_str()
            )));
        }
        self.status = ImportStatus::Completed;
        self.progress_pct = 100;
        self.merged = Some(merged);
        self.message = None;
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "cannot fail import from {}",
                self.status.as_str()
            )));
        }
        self.status = ImportStatus::Failed;
        self.message = Some(message.into());
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
