//! Mapping generated text onto a document's section schema.

use crate::document::{DocumentContent, DocumentType, HealthScore, Section};

/// Points each generated section is worth.
pub const POINTS_PER_SECTION: i64 = 12;
/// Generation alone never produces a perfect score.
pub const GENERATION_SCORE_CAP: i64 = 95;

/// Map `text` onto the ordered schema of `doc_type`.
///
/// Lines are trimmed and blank lines dropped; each section takes the next
/// remaining line, or its placeholder once lines run out. Extra lines are
/// ignored. The result always has exactly one section per schema slot.
pub fn map_sections(doc_type: DocumentType, text: &str) -> DocumentContent {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    let sections = doc_type
        .sections()
        .iter()
        .map(|&kind| Section {
            kind,
            body: lines
                .next()
                .map(str::to_owned)
                .unwrap_or_else(|| kind.placeholder()),
        })
        .collect();

    DocumentContent::new(sections)
}

/// Deterministic stand-in for AI output: one line per section, built from the
/// document title and the user's prompt.
pub fn fallback_text(doc_type: DocumentType, title: &str, prompt: &str) -> String {
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let focus = match first_sentence(prompt) {
        s if s.is_empty() => "the work that matters most".to_owned(),
        s => s,
    };

    doc_type
        .sections()
        .iter()
        .map(|kind| {
            format!(
                "{}: {} for {}, focused on {}.",
                kind.placeholder(),
                doc_type.label(),
                if title.is_empty() { "this document" } else { title.as_str() },
                focus
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `min(count * 12, 95)`.
pub fn generation_health_score(section_count: usize) -> HealthScore {
    let count = i64::try_from(section_count).unwrap_or(i64::MAX / POINTS_PER_SECTION);
    HealthScore::new((count * POINTS_PER_SECTION).min(GENERATION_SCORE_CAP))
}

fn first_sentence(prompt: &str) -> String {
    let line = prompt.trim().lines().next().unwrap_or_default();
    let sentence = line
        .split_terminator(['.', '!', '?'])
        .next()
        .unwrap_or(line)
        .trim();
    sentence.chars().take(160).collect()
}
