//! Keyword findings in publication and presentation text.
//!
//! Unlike the free-text tier this does not produce measurements. It records
//! where clinical keywords appear and sorts each hit by its surrounding text:
//! endpoint talk, baseline talk, or anything else. Publications contribute
//! the first hit per keyword (±100 bytes); presentations contribute every
//! hit (±150 bytes).

use std::sync::OnceLock;

use regex::Regex;

use trialscope_common::record::{ExtractedClinicalData, KeywordFinding, Publications};

const KEYWORDS: &[&str] = &[
    "PVR",
    "6MWD",
    "NT-proBNP",
    "WHO FC",
    "baseline",
    "endpoint",
    "pulmonary vascular resistance",
    "6-minute walk",
    "brain natriuretic peptide",
    "functional class",
    "p<",
    "p =",
    "statistically significant",
];

const ENDPOINT_TERMS: &[&str] = &["endpoint", "outcome", "result", "change", "improvement"];
const BASELINE_TERMS: &[&str] = &["baseline", "characteristic", "initial"];

const PUBLICATION_RADIUS: usize = 100;
const PRESENTATION_RADIUS: usize = 150;

fn keyword_patterns() -> &'static [(&'static str, Regex)] {
    static RE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RE.get_or_init(|| {
        KEYWORDS
            .iter()
            .map(|k| (*k, Regex::new(&format!("(?i){}", regex::escape(k))).unwrap()))
            .collect()
    })
}

/// Sort every keyword hit in `publications` into endpoints, baseline
/// measures and other findings.
pub fn extract_clinical_data(publications: &Publications) -> ExtractedClinicalData {
    let mut data = ExtractedClinicalData::default();

    for publication in &publications.scientific_publications {
        let Some(text) = publication.text() else { continue };
        let source = format!("Scientific publication: {}", publication.title);
        for (keyword, re) in keyword_patterns() {
            if let Some(m) = re.find(text) {
                let context = window(text, m.start(), m.end(), PUBLICATION_RADIUS);
                file_finding(&mut data, keyword, context, &source);
            }
        }
    }

    for presentation in &publications.company_presentations {
        let Some(text) = presentation.text() else { continue };
        let source = format!("Company presentation: {}", presentation.title);
        for (keyword, re) in keyword_patterns() {
            for m in re.find_iter(text) {
                let context = window(text, m.start(), m.end(), PRESENTATION_RADIUS);
                file_finding(&mut data, keyword, context, &source);
            }
        }
    }

    data
}

/// Findings worth keeping on the record: `None` unless at least one endpoint
/// or baseline mention was found.
pub fn find_clinical_data(publications: &Publications) -> Option<ExtractedClinicalData> {
    Some(extract_clinical_data(publications)).filter(ExtractedClinicalData::has_measures)
}

fn file_finding(data: &mut ExtractedClinicalData, keyword: &str, context: &str, source: &str) {
    let lower = context.to_lowercase();
    let finding = KeywordFinding {
        keyword: keyword.to_string(),
        context: context.to_string(),
        source: source.to_string(),
    };
    if ENDPOINT_TERMS.iter().any(|t| lower.contains(t)) {
        data.endpoints.push(finding);
    } else if BASELINE_TERMS.iter().any(|t| lower.contains(t)) {
        data.baseline_measures.push(finding);
    } else {
        data.other_findings.push(finding);
    }
}

/// `radius` bytes either side of `start..end`, widened to char boundaries.
fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let mut from = start.saturating_sub(radius);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + radius).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    &text[from..to]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use trialscope_common::record::{CompanyPresentation, ScientificPublication};

    fn publication(title: &str, snippet: &str) -> ScientificPublication {
        ScientificPublication {
            title: title.to_string(),
            snippet: snippet.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_publication_hits_are_sorted_by_context() {
        let pubs = Publications {
            scientific_publications: vec![
                publication("GRIPHON", "The primary endpoint was met; PVR fell."),
                publication("Cohort", "Mean PVR at baseline was 860 dyn."),
                publication("Review", "PVR is measured by right heart catheterisation."),
            ],
            ..Default::default()
        };
        let data = extract_clinical_data(&pubs);

        // "endpoint" and "PVR" both hit the first snippet.
        assert_eq!(data.endpoints.len(), 2);
        assert!(data.endpoints.iter().all(|f| f.source == "Scientific publication: GRIPHON"));
        assert_eq!(
            data.baseline_measures.iter().map(|f| f.keyword.as_str()).collect::<Vec<_>>(),
            vec!["PVR", "baseline"]
        );
        assert_eq!(data.other_findings.len(), 1);
        assert_eq!(data.other_findings[0].keyword, "PVR");
        assert_eq!(data.other_findings[0].context, "PVR is measured by right heart catheterisation.");
    }

    #[test]
    fn test_publication_keeps_first_hit_per_keyword() {
        let pubs = Publications {
            scientific_publications: vec![publication("T", "6MWD rose; 6mwd result held")],
            ..Default::default()
        };
        let data = extract_clinical_data(&pubs);
        assert_eq!(data.endpoints.len(), 1);
        assert_eq!(data.endpoints[0].keyword, "6MWD");
    }

    #[test]
    fn test_presentation_keeps_every_hit() {
        let deck = format!("WHO FC result improved{}who fc stable", " ".repeat(400));
        let pubs = Publications {
            company_presentations: vec![CompanyPresentation {
                title: "Investor day".to_string(),
                text_sample: Some(deck),
                ..Default::default()
            }],
            ..Default::default()
        };
        let data = extract_clinical_data(&pubs);
        let hits: Vec<&KeywordFinding> = data
            .endpoints
            .iter()
            .chain(&data.other_findings)
            .filter(|f| f.keyword == "WHO FC")
            .collect();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|f| f.source == "Company presentation: Investor day"));
        // The two hits are more than a window apart.
        assert_eq!(data.endpoints.len(), 1);
        assert_eq!(data.other_findings.len(), 1);
    }

    #[test]
    fn test_context_window_respects_char_boundaries() {
        let text = format!("{}PVR{}", "é".repeat(80), "ü".repeat(80));
        let start = text.find("PVR").unwrap();
        let ctx = window(&text, start, start + 3, 101);
        assert!(ctx.contains("PVR"));
        assert!(ctx.starts_with('é') && ctx.ends_with('ü'));
    }

    #[test]
    fn test_findings_kept_only_with_measures() {
        let other_only = Publications {
            scientific_publications: vec![publication("Review", "PVR is a haemodynamic measure.")],
            ..Default::default()
        };
        assert_eq!(find_clinical_data(&other_only), None);
        assert_eq!(find_clinical_data(&Publications::default()), None);

        let with_endpoint = Publications {
            scientific_publications: vec![publication("T", "6MWD change of 22 m (p<0.01)")],
            ..Default::default()
        };
        let data = find_clinical_data(&with_endpoint).unwrap();
        assert_eq!(
            data.endpoints.iter().map(|f| f.keyword.as_str()).collect::<Vec<_>>(),
            vec!["6MWD", "p<"]
        );
    }
}
