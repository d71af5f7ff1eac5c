use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::{Check, checklist_score};
use crate::document::SeoMetadata;

const TITLE_RANGE: RangeInclusive<usize> = 30..=70;
const DESCRIPTION_RANGE: RangeInclusive<usize> = 80..=200;
const MIN_KEYWORDS: usize = 3;
const MIN_CONTENT_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoAudit {
    pub score: u8,
    pub checks: Vec<Check>,
}

impl SeoAudit {
    /// Audit stored SEO metadata. `content_len` is the length of the
    /// serialized document content. Labels state the exact ranges scored.
    pub fn audit(meta: &SeoMetadata, content_len: usize) -> Self {
        let title_len = meta.title.trim().chars().count();
        let description_len = meta.description.trim().chars().count();
        let keywords = meta.keywords.iter().filter(|k| !k.trim().is_empty()).count();
        let has_og_image = meta.og_image.as_deref().is_some_and(|u| !u.trim().is_empty());

        let checks = vec![
            Check::new(
                "title_length",
                "Title is 30-70 characters",
                20,
                TITLE_RANGE.contains(&title_len),
            ),
            Check::new(
                "description_length",
                "Meta description is 80-200 characters",
                20,
                DESCRIPTION_RANGE.contains(&description_len),
            ),
            Check::new("keywords", "At least 3 keywords", 15, keywords >= MIN_KEYWORDS),
            Check::new(
                "content_length",
                "More than 500 characters of content",
                20,
                content_len > MIN_CONTENT_LEN,
            ),
            Check::new("og_image", "Open Graph image set", 15, has_og_image),
            Check::new("structured_data", "Structured data enabled", 10, meta.structured_data),
        ];

        Self {
            score: checklist_score(&checks),
            checks,
        }
    }
}
