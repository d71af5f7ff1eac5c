//! Deterministic scoring algorithms behind the critique, ATS-scan and
//! SEO-audit jobs. Each one works without the AI dependency.

mod ats;
mod critique;
mod seo;

use serde::{Deserialize, Serialize};

pub use ats::{AtsReport, KeywordMatch};
pub use critique::CritiqueReport;
pub use seo::SeoAudit;

/// One weighted pass/fail item of a checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub key: String,
    pub label: String,
    pub weight: u8,
    pub passed: bool,
}

impl Check {
    fn new(key: &str, label: &str, weight: u8, passed: bool) -> Self {
        Self {
            key: key.to_owned(),
            label: label.to_owned(),
            weight,
            passed,
        }
    }
}

/// Sum of the weights of passed checks.
pub fn checklist_score(checks: &[Check]) -> u8 {
    checks
        .iter()
        .filter(|c| c.passed)
        .map(|c| u32::from(c.weight))
        .sum::<u32>()
        .min(100) as u8
}
