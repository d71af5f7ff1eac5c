use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Check, checklist_score};

struct KeywordCheck {
    key: &'static str,
    label: &'static str,
    weight: u8,
    keywords: &'static [&'static str],
}

const KEYWORD_CHECKS: &[KeywordCheck] = &[
    KeywordCheck {
        key: "contact",
        label: "Contact information present",
        weight: 15,
        keywords: &["email", "e-mail", "phone", "@", "linkedin", "contact"],
    },
    KeywordCheck {
        key: "summary",
        label: "Professional summary",
        weight: 15,
        keywords: &["summary", "profile", "objective", "about me"],
    },
    KeywordCheck {
        key: "experience",
        label: "Experience section",
        weight: 20,
        keywords: &["experience", "employment", "work history"],
    },
    KeywordCheck {
        key: "education",
        label: "Education section",
        weight: 15,
        keywords: &["education", "degree", "university", "college"],
    },
    KeywordCheck {
        key: "skills",
        label: "Skills section",
        weight: 15,
        keywords: &["skills", "technologies", "proficienc"],
    },
];

const ACTION_VERB_WEIGHT: u8 = 10;
const QUANTIFIED_WEIGHT: u8 = 10;

static ACTION_VERBS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(led|managed|developed|built|designed|implemented|created|improved|increased|reduced|launched|delivered|achieved|optimized|architected|spearheaded)\b",
    )
    .expect("action verb pattern")
});

static QUANTIFIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\d+(\.\d+)?\s*(%|\+|x\b)|\$\s?\d|\b\d+\s+(users|customers|clients|people|engineers|members|teams|projects|countries|downloads|requests|transactions|employees|students)\b",
    )
    .expect("quantified achievement pattern")
});

/// At most this many missing job keywords are reported.
const MAX_MISSING: usize = 10;
const MIN_WORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordMatch {
    pub match_score: u8,
    pub matched: usize,
    pub total: usize,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsReport {
    pub score: u8,
    pub checks: Vec<Check>,
    pub keyword_match: Option<KeywordMatch>,
}

impl AtsReport {
    /// Run the weighted checklist against `text` (lower-cased here), plus a
    /// keyword overlap when a non-blank job description is given.
    pub fn scan(text: &str, job_description: Option<&str>) -> Self {
        let text = text.to_lowercase();

        let mut checks: Vec<Check> = KEYWORD_CHECKS
            .iter()
            .map(|c| {
                let passed = c.keywords.iter().any(|k| text.contains(k));
                Check::new(c.key, c.label, c.weight, passed)
            })
            .collect();
        checks.push(Check::new(
            "action_verbs",
            "Uses action verbs",
            ACTION_VERB_WEIGHT,
            ACTION_VERBS.is_match(&text),
        ));
        checks.push(Check::new(
            "quantified",
            "Quantified achievements",
            QUANTIFIED_WEIGHT,
            QUANTIFIED.is_match(&text),
        ));

        let keyword_match = job_description
            .filter(|jd| !jd.trim().is_empty())
            .map(|jd| keyword_match(&text, jd));

        Self {
            score: checklist_score(&checks),
            checks,
            keyword_match,
        }
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .map(str::to_lowercase)
}

fn keyword_match(text: &str, job_description: &str) -> KeywordMatch {
    let doc_words: HashSet<String> = words(text).collect();

    let mut seen = HashSet::new();
    let job_words: Vec<String> = words(job_description)
        .filter(|w| seen.insert(w.clone()))
        .collect();

    let (found, absent): (Vec<_>, Vec<_>) =
        job_words.into_iter().partition(|w| doc_words.contains(w));
    let total = found.len() + absent.len();
    let match_score = if total == 0 {
        0
    } else {
        (found.len() as f64 / total as f64 * 100.0).round() as u8
    };

    KeywordMatch {
        match_score,
        matched: found.len(),
        total,
        missing: absent.into_iter().take(MAX_MISSING).collect(),
    }
}
