//! Prompt builders. Callers pass plain labels so this crate stays free of
//! document types.

/// Prompt asking for one line of text per section, in schema order.
pub fn generation_prompt(doc_label: &str, title: &str, sections: &[&str], user_prompt: &str) -> String {
    format!(
        "Write the content of a {doc_label} titled \"{title}\".\n\
         Return exactly {count} lines of plain text, one per section, in this order: {order}.\n\
         Do not number the lines or add headings.\n\n\
         Author's request:\n{user_prompt}",
        count = sections.len(),
        order = sections.join(", "),
    )
}

pub const GENERATION_SYSTEM: &str =
    "You write concise, professional portfolio and resume content.";

/// Prompt asking for short improvement suggestions on existing content.
pub fn suggestion_prompt(doc_label: &str, content_json: &str) -> String {
    format!(
        "Review this {doc_label} and suggest at most 5 concrete improvements, \
         one per line, without numbering.\n\n{content_json}"
    )
}

/// Split a suggestion completion into at most `limit` non-empty lines,
/// stripping list markers.
pub fn parse_suggestions(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(|l| {
            l.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim()
        })
        .filter(|l| !l.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}
