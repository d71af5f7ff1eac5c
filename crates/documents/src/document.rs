use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::{DocumentId, UserId};

use crate::analysis::{AtsReport, CritiqueReport, SeoAudit};
use crate::status::JobStatus;

/// Kind of content artifact. Each kind has a fixed, ordered section schema.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Portfolio,
    Resume,
    CoverLetter,
}

impl DocumentType {
    /// Ordered section schema for this document type.
    pub fn sections(self) -> &'static [SectionKind] {
        use SectionKind::*;
        match self {
            DocumentType::Portfolio => &[Hero, About, Work, Projects, Skills, Contact],
            DocumentType::Resume => &[Summary, Experience, Education, Skills],
            DocumentType::CoverLetter => &[Opening, Body, Closing],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentType::Portfolio => "portfolio",
            DocumentType::Resume => "resume",
            DocumentType::CoverLetter => "cover letter",
        }
    }
}

/// A section slot. Tagged so the mapping from generated text onto a document
/// is checked against the schema of its type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Hero,
    About,
    Work,
    Projects,
    Skills,
    Contact,
    Summary,
    Experience,
    Education,
    Opening,
    Body,
    Closing,
}

impl SectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Hero => "hero",
            SectionKind::About => "about",
            SectionKind::Work => "work",
            SectionKind::Projects => "projects",
            SectionKind::Skills => "skills",
            SectionKind::Contact => "contact",
            SectionKind::Summary => "summary",
            SectionKind::Experience => "experience",
            SectionKind::Education => "education",
            SectionKind::Opening => "opening",
            SectionKind::Body => "body",
            SectionKind::Closing => "closing",
        }
    }

    /// Text used when generation produced fewer lines than the schema has
    /// sections, e.g. `"Skills section"`.
    pub fn placeholder(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("{}{} section", first.to_uppercase(), chars.as_str()),
            None => String::from("Section"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub body: String,
}

/// Semantic content of a document: ordered sections, nothing else.
///
/// Pipeline control state lives in [`JobStatus`], never in here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContent {
    sections: Vec<Section>,
}

impl DocumentContent {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, kind: SectionKind) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| s.body.as_str())
    }

    /// Replace the body of `kind`, appending the section if it is absent.
    pub fn upsert(&mut self, kind: SectionKind, body: impl Into<String>) {
        let body = body.into();
        match self.sections.iter_mut().find(|s| s.kind == kind) {
            Some(section) => section.body = body,
            None => self.sections.push(Section { kind, body }),
        }
    }

    /// Canonical JSON form, the text every scoring algorithm measures.
    pub fn serialized(&self) -> String {
        // A Vec of plain structs with string fields cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Document quality score, always within `0..=100`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthScore(u8);

impl HealthScore {
    pub const MAX: u8 = 100;

    /// Clamp any integer into the valid range.
    pub fn new(value: i64) -> Self {
        Self(value.clamp(0, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// SEO metadata the SEO audit is scored against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoMetadata {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub og_image: Option<String>,
    pub structured_data: bool,
}

/// Latest result of each analysis job, kept apart from the sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub critique: Option<CritiqueReport>,
    pub ats: Option<AtsReport>,
    pub seo: Option<SeoAudit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: UserId,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub title: String,
    pub content: DocumentContent,
    pub health_score: HealthScore,
    pub status: JobStatus,
    pub seo: SeoMetadata,
    pub analysis: DocumentAnalysis,
    pub is_public: bool,
    pub public_url: Option<String>,
    /// Optimistic concurrency revision, bumped by the store on every save.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        id: DocumentId,
        owner_id: UserId,
        doc_type: DocumentType,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id,
            doc_type,
            title: title.into(),
            content: DocumentContent::default(),
            health_score: HealthScore::default(),
            status: JobStatus::idle(),
            seo: SeoMetadata::default(),
            analysis: DocumentAnalysis::default(),
            is_public: false,
            public_url: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owned_by(&self, user_id: UserId) -> bool {
        self.owner_id == user_id
    }

    /// Copy of this document under a new id: same type, content, SEO data and
    /// score; idle, private, fresh revision.
    pub fn duplicate(&self, id: DocumentId) -> Self {
        let mut copy = Document::new(
            id,
            self.owner_id,
            self.doc_type,
            format!("{} (Copy)", self.title),
        );
        copy.content = self.content.clone();
        copy.seo = self.seo.clone();
        copy.health_score = self.health_score;
        copy
    }
}
