use serde::{Deserialize, Serialize};

use crate::document::{DocumentContent, DocumentType};

/// A section counts as filled once its serialized body exceeds this length.
const FILLED_THRESHOLD: usize = 50;
/// Sub-scores below this produce an improvement hint.
const HINT_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CritiqueReport {
    pub completeness: u8,
    pub readability: u8,
    pub ats: u8,
    pub seo: u8,
    pub overall: u8,
    pub hints: Vec<String>,
    /// Free-text AI suggestions; empty when the AI call failed.
    pub suggestions: Vec<String>,
}

impl CritiqueReport {
    /// Score `content` against the section schema of `doc_type`.
    pub fn score(doc_type: DocumentType, content: &DocumentContent) -> Self {
        let schema = doc_type.sections();
        let filled = schema
            .iter()
            .filter(|&&kind| {
                content
                    .get(kind)
                    .and_then(|body| serde_json::to_string(body).ok())
                    .is_some_and(|s| s.len() > FILLED_THRESHOLD)
            })
            .count();
        let total = schema.len().max(1);
        let length = content.serialized().len() as f64;

        let completeness = round(filled as f64 / total as f64 * 100.0);
        let readability = round(50.0 + length / 500.0).min(95);
        let ats = round(55.0 + f64::from(completeness) * 0.4).min(95);
        let seo = round(45.0 + length / 600.0).min(90);
        let overall = round(
            (f64::from(completeness) + f64::from(readability) + f64::from(ats) + f64::from(seo))
                / 4.0,
        );

        let mut hints = Vec::new();
        if completeness < HINT_THRESHOLD {
            hints.push(format!(
                "Fill in the remaining sections: {filled} of {} have substantial content.",
                schema.len()
            ));
        }
        if readability < HINT_THRESHOLD {
            hints.push("Add more detail so each section reads as a complete story.".to_owned());
        }
        if ats < HINT_THRESHOLD {
            hints.push("Complete every section so applicant tracking systems can parse it.".to_owned());
        }
        if seo < HINT_THRESHOLD {
            hints.push("Expand your content with descriptive keywords to improve search visibility.".to_owned());
        }

        Self {
            completeness,
            readability,
            ats,
            seo,
            overall,
            hints,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }
}

fn round(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
