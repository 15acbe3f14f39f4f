//! Dose, frequency and formulation derivation from intervention descriptions.

use regex::Regex;
use std::sync::OnceLock;

use trialscope_common::record::UNKNOWN;

/// Frequency labels and their trigger phrases.
///
/// Checked in order, so the more specific phrases ("twice daily",
/// "biweekly") sit before the generic ones they contain ("daily", "weekly").
const FREQUENCIES: &[(&str, &[&str])] = &[
    ("twice daily", &["twice daily", "bid", "b.i.d"]),
    ("three times daily", &["three times daily", "tid", "t.i.d"]),
    ("four times daily", &["four times daily", "qid", "q.i.d"]),
    ("twice weekly", &["twice weekly", "biweekly"]),
    ("once daily", &["once daily", "daily", "qd"]),
    ("weekly", &["weekly", "once a week"]),
    ("monthly", &["monthly", "once a month"]),
];

const FORMULATIONS: &[&str] = &[
    "tablet", "capsule", "solution", "suspension", "injection", "infusion",
    "inhalation", "inhaled", "oral", "intravenous", "subcutaneous",
    "intramuscular", "topical", "patch", "cream", "ointment", "powder", "spray",
];

fn dose_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?\s*mg)").unwrap())
}

/// First `<number> mg` amount, e.g. "10 mg".
pub fn extract_dose(description: &str) -> String {
    dose_regex()
        .captures(description)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn extract_frequency(description: &str) -> String {
    let lower = description.to_lowercase();
    FREQUENCIES
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| contains_term(&lower, t)))
        .map(|(label, _)| label.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// First listed formulation mentioned, capitalised ("Tablet").
pub fn extract_formulation(description: &str) -> String {
    let lower = description.to_lowercase();
    FORMULATIONS
        .iter()
        .find(|f| lower.contains(*f))
        .map(|f| capitalise(f))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Short abbreviations ("bid", "qd") only count as whole words.
fn contains_term(haystack: &str, term: &str) -> bool {
    if term.len() > 3 {
        return haystack.contains(term);
    }
    haystack
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '.')
        .any(|word| word.trim_end_matches('.') == term)
}

pub(crate) fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dose() {
        assert_eq!(extract_dose("Macitentan 10 mg tablet once daily"), "10 mg");
        assert_eq!(extract_dose("riociguat 2.5mg three times daily"), "2.5mg");
        assert_eq!(extract_dose("matching placebo"), UNKNOWN);
    }

    #[test]
    fn test_frequency_prefers_specific_phrase() {
        assert_eq!(extract_frequency("Selexipag twice daily"), "twice daily");
        assert_eq!(extract_frequency("10 mg daily"), "once daily");
        assert_eq!(extract_frequency("given BID with food"), "twice daily");
        assert_eq!(extract_frequency("injection biweekly"), "twice weekly");
        assert_eq!(extract_frequency("every morning"), UNKNOWN);
    }

    #[test]
    fn test_abbreviation_needs_word_boundary() {
        // "tid" inside "peptide" must not count.
        assert_eq!(extract_frequency("a synthetic peptide"), UNKNOWN);
        assert_eq!(extract_frequency("2.5 mg t.i.d."), "three times daily");
    }

    #[test]
    fn test_formulation() {
        assert_eq!(extract_formulation("Film-coated TABLET, oral"), "Tablet");
        assert_eq!(extract_formulation("continuous subcutaneous infusion"), "Infusion");
        assert_eq!(extract_formulation(""), UNKNOWN);
    }
}
