//! Tier 2: regex extraction from publication and presentation text.
//!
//! Each known measure has four pattern alternatives whose first capture group
//! is the number of interest. Every hit becomes a candidate; candidates are
//! then collapsed per `(name, arm)` by [`dedup_candidates`].

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use trialscope_common::record::{
    parse_number, Arm, BaselineMeasure, Endpoint, Publications, Tier, NOT_SPECIFIED,
};
use crate::dedup::dedup_candidates;
use crate::normalise::AliasNormaliser;
use super::{ExtractionTier, TrialInputs};

/// Bytes of text kept on either side of a hit.
const CONTEXT_RADIUS: usize = 200;
/// How far past the number the endpoint variant looks for baseline wording.
const TRAILING_WINDOW: usize = 24;

const ENDPOINT_BASELINE_TERMS: &[&str] = &["baseline", "initial", "at screening", "at enrollment"];
const BASELINE_TERMS: &[&str] = &[
    "baseline",
    "initial",
    "at screening",
    "at enrollment",
    "demographics",
];
const PLACEBO_TERMS: &[&str] = &["placebo", "control group", "control arm"];
const SENTENCE_BREAKS: &[&str] = &[". ", ";", "\n"];

// ── Pattern tables ────────────────────────────────────────────────────────────

struct PatternSet {
    name: &'static str,
    description: &'static str,
    patterns: Vec<Regex>,
}

fn compile(name: &'static str, description: &'static str, patterns: &[&str]) -> PatternSet {
    PatternSet {
        name,
        description,
        patterns: patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
            .collect(),
    }
}

fn endpoint_patterns() -> &'static [PatternSet] {
    static PATTERNS: OnceLock<Vec<PatternSet>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            compile(
                "PVR",
                "Pulmonary Vascular Resistance - measure of resistance in pulmonary circulation",
                &[
                    r"(?:PVR|pulmonary vascular resistance).*?(-?\d+\.?\d*)\s*(?:%|percent)?",
                    r"(?:pulmonary resistance).*?(-?\d+\.?\d*)\s*(?:dyn|dyne|Wood|%|percent)?",
                    r"(?:decrease|change|reduction|improvement)\s+in\s+(?:PVR|pulmonary vascular resistance).*?(-?\d+\.?\d*)",
                    r"(?:PVR|pulmonary vascular resistance).*?(?:was|were|of|:)\s*(-?\d+\.?\d*)",
                ],
            ),
            compile(
                "6MWD",
                "6-Minute Walk Distance - measure of exercise capacity",
                &[
                    r"(?:6MWD|6-minute walk distance|6 minute walk).*?(-?\d+\.?\d*)\s*(?:m|meters|meter)?",
                    r"(?:increase|change|improvement)\s+in\s+(?:6MWD|6-minute walk distance|6 minute walk).*?(-?\d+\.?\d*)",
                    r"(?:6MWD|6-minute walk distance|6 minute walk).*?(?:was|were|of|:)\s*(-?\d+\.?\d*)",
                    r"(?:distance walked).*?(-?\d+\.?\d*)\s*(?:m|meters|meter)",
                ],
            ),
            compile(
                "NT-proBNP",
                "NT-proBNP - biomarker of heart failure",
                &[
                    r"(?:NT-proBNP|NT proBNP|N-terminal pro.{0,20}BNP).*?(-?\d+\.?\d*)",
                    r"(?:decrease|change|reduction)\s+in\s+(?:NT-proBNP|NT proBNP|N-terminal pro.{0,20}BNP).*?(-?\d+\.?\d*)",
                    r"(?:NT-proBNP|NT proBNP|N-terminal pro.{0,20}BNP).*?(?:was|were|of|:)\s*(-?\d+\.?\d*)",
                    r"(?:brain natriuretic peptide).*?(-?\d+\.?\d*)",
                ],
            ),
            compile(
                "WHO FC",
                "WHO Functional Class - classification of functional status in patients with pulmonary hypertension",
                &[
                    r"(?:WHO FC|WHO Functional Class|Functional Class).*?(-?\d+\.?\d*)",
                    r"(?:improvement|change)\s+in\s+(?:WHO FC|WHO Functional Class|Functional Class).*?(-?\d+\.?\d*)",
                    r"(?:WHO FC|WHO Functional Class|Functional Class).*?(?:was|were|of|:)\s*(-?\d+\.?\d*)",
                    r"(?:functional class improvement).*?(-?\d+\.?\d*)",
                ],
            ),
            compile(
                "CI",
                "Cardiac Index - a measurement of cardiac output adjusted for body size",
                &[
                    r"(?:cardiac index|CI).*?(-?\d+\.?\d*)",
                    r"(?:increase|change|improvement)\s+in\s+(?:cardiac index|CI).*?(-?\d+\.?\d*)",
                    r"(?:cardiac index|CI).*?(?:was|were|of|:)\s*(-?\d+\.?\d*)",
                    r"(?:cardiac output).*?(-?\d+\.?\d*)\s*(?:L/min|L/min/m2)",
                ],
            ),
        ]
    })
}

fn baseline_patterns() -> &'static [PatternSet] {
    static PATTERNS: OnceLock<Vec<PatternSet>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            compile(
                "PVR",
                "Baseline Pulmonary Vascular Resistance",
                &[
                    r"(?:baseline|initial)\s+(?:pulmonary vascular resistance|PVR).*?(\d+\.?\d*)",
                    r"(?:pulmonary vascular resistance|PVR)\s+(?:at|@)?\s+baseline.*?(\d+\.?\d*)",
                    r"(?:baseline|initial|mean)\s+(?:pulmonary vascular resistance|PVR).*?(\d+\.?\d*)\s*(?:dyn|dyne|Wood)",
                    r"baseline characteristics.*?(?:pvr|pulmonary vascular resistance).*?(\d+\.?\d*)",
                ],
            ),
            compile(
                "6MWD",
                "Baseline 6-Minute Walk Distance",
                &[
                    r"(?:baseline|initial)\s+(?:6-minute walk distance|6MWD|6 minute walk distance).*?(\d+\.?\d*)",
                    r"(?:6-minute walk distance|6MWD|6 minute walk distance)\s+(?:at|@)?\s+baseline.*?(\d+\.?\d*)",
                    r"(?:baseline|initial|mean)\s+(?:6-minute walk distance|6MWD|6 minute walk distance).*?(\d+\.?\d*)\s*(?:meters|m|meter)",
                    r"baseline characteristics.*?(?:6mwd|6-minute walk distance).*?(\d+\.?\d*)",
                ],
            ),
            compile(
                "NT-proBNP",
                "Baseline NT-proBNP levels",
                &[
                    r"(?:baseline|initial)\s+(?:NT-proBNP|NT\s+proBNP|N-terminal pro-brain natriuretic peptide).*?(\d+\.?\d*)",
                    r"(?:NT-proBNP|NT\s+proBNP|N-terminal pro-brain natriuretic peptide)\s+(?:at|@)?\s+baseline.*?(\d+\.?\d*)",
                    r"(?:baseline|initial|mean)\s+(?:NT-proBNP|NT\s+proBNP|N-terminal pro-brain natriuretic peptide).*?(\d+\.?\d*)",
                    r"baseline characteristics.*?(?:nt-probnp|natriuretic peptide).*?(\d+\.?\d*)",
                ],
            ),
            compile(
                "WHO FC",
                "Baseline WHO Functional Class",
                &[
                    r"(?:baseline|initial)\s+(?:WHO Functional Class|WHO\s+FC|Functional Class).*?(\d+\.?\d*)",
                    r"(?:WHO Functional Class|WHO\s+FC|Functional Class)\s+(?:at|@)?\s+baseline.*?(\d+\.?\d*)",
                    r"(?:baseline|initial|mean)\s+(?:WHO Functional Class|WHO\s+FC|Functional Class).*?(\d+\.?\d*)",
                    r"baseline characteristics.*?(?:who fc|functional class).*?(\d+\.?\d*)",
                ],
            ),
            compile(
                "CI",
                "Baseline Cardiac Index",
                &[
                    r"(?:baseline|initial)\s+(?:cardiac index|CI).*?(\d+\.?\d*)",
                    r"(?:cardiac index|CI)\s+(?:at|@)?\s+baseline.*?(\d+\.?\d*)",
                    r"(?:baseline|initial|mean)\s+(?:cardiac index|CI).*?(\d+\.?\d*)",
                    r"baseline characteristics.*?(?:cardiac index|ci).*?(\d+\.?\d*)",
                ],
            ),
        ]
    })
}

fn generic_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"decrease(?:d)? by (\d+\.?\d*)%", "Percent decrease"),
            (r"increase(?:d)? by (\d+\.?\d*)%", "Percent increase"),
            (r"improved by (\d+\.?\d*)", "Improvement"),
            (r"reduction of (\d+\.?\d*)", "Reduction"),
            (r"change of (\d+\.?\d*)", "Change"),
        ]
        .into_iter()
        .map(|(p, label)| (Regex::new(p).unwrap(), label))
        .collect()
    })
}

fn p_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"p\s*[<=>]\s*(0\.\d+)").unwrap())
}

fn timepoint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:week|month|day)\s*(\d+)").unwrap())
}

// ── Tier ──────────────────────────────────────────────────────────────────────

/// Free-text tier for both endpoints and baseline measures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeTextTier;

impl ExtractionTier<Endpoint> for FreeTextTier {
    fn name(&self) -> &'static str {
        "free_text"
    }

    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<Endpoint> {
        extract_endpoints(inputs.publications)
    }
}

impl ExtractionTier<BaselineMeasure> for FreeTextTier {
    fn name(&self) -> &'static str {
        "free_text"
    }

    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<BaselineMeasure> {
        extract_baselines(inputs.publications)
    }
}

/// A lower-cased document and the provenance line its hits carry.
struct SourceText {
    text: String,
    provenance: String,
    is_publication: bool,
}

fn source_texts(publications: &Publications) -> Vec<SourceText> {
    let scientific = publications.scientific_publications.iter().filter_map(|p| {
        p.text().map(|text| SourceText {
            text: text.to_lowercase(),
            provenance: format!("Extracted from publication: {}", title_or_unknown(&p.title)),
            is_publication: true,
        })
    });
    let presentations = publications.company_presentations.iter().filter_map(|p| {
        p.text().map(|text| SourceText {
            text: text.to_lowercase(),
            provenance: format!("Extracted from presentation: {}", title_or_unknown(&p.title)),
            is_publication: false,
        })
    });
    scientific.chain(presentations).collect()
}

fn title_or_unknown(title: &str) -> &str {
    if title.trim().is_empty() {
        "Unknown"
    } else {
        title
    }
}

/// One regex hit: the captured number plus the text around it.
struct Hit<'t> {
    value: f64,
    context: &'t str,
    /// From the window start up to the end of the number, cut at the last
    /// sentence break.
    lead: &'t str,
    /// Up to [`TRAILING_WINDOW`] bytes after the number, cut at the first
    /// sentence break.
    trailing: &'t str,
}

fn hits<'t>(set: &PatternSet, text: &'t str) -> Vec<Hit<'t>> {
    let mut out = Vec::new();
    for re in &set.patterns {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let Some(value) = parse_number(m.as_str()) else { continue };

            let start = floor_boundary(text, m.start().saturating_sub(CONTEXT_RADIUS));
            let end = ceil_boundary(text, m.start() + CONTEXT_RADIUS);

            let lead = &text[start..m.end()];
            let lead = match last_break(lead) {
                Some(i) => &lead[i..],
                None => lead,
            };
            let trailing = &text[m.end()..ceil_boundary(text, m.end() + TRAILING_WINDOW)];
            let trailing = match first_break(trailing) {
                Some(i) => &trailing[..i],
                None => trailing,
            };

            out.push(Hit {
                value,
                context: &text[start..end],
                lead,
                trailing,
            });
        }
    }
    out
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

pub fn extract_endpoints(publications: &Publications) -> Vec<Endpoint> {
    let sources = source_texts(publications);
    let normaliser = AliasNormaliser::standard();
    let mut candidates = Vec::new();

    for source in &sources {
        for set in endpoint_patterns() {
            for hit in hits(set, &source.text) {
                if contains_any(hit.lead, ENDPOINT_BASELINE_TERMS)
                    || contains_any(hit.trailing, ENDPOINT_BASELINE_TERMS)
                {
                    continue;
                }
                candidates.push(Endpoint {
                    name: set.name.to_string(),
                    canonical_name: Some(normaliser.normalise(set.name)),
                    description: set.description.to_string(),
                    timepoint: timepoint(hit.context),
                    arm: arm_of(hit.context),
                    average_value: Some(hit.value),
                    upper_end: None,
                    lower_end: None,
                    statistical_significance: significance(hit.context),
                    source: Some(source.provenance.clone()),
                    context: Some(hit.context.to_string()),
                    tier: Some(Tier::FreeText),
                });
            }
        }
    }

    if candidates.is_empty() && !publications.is_empty() {
        debug!("no known measure matched, trying generic numeric patterns");
        candidates = generic_endpoints(&sources);
    }

    let endpoints = dedup_candidates(candidates);
    debug!(n = endpoints.len(), "free-text endpoints extracted");
    endpoints
}

/// Last-resort numbers from scientific publications only.
fn generic_endpoints(sources: &[SourceText]) -> Vec<Endpoint> {
    let mut out = Vec::new();
    for source in sources.iter().filter(|s| s.is_publication) {
        let context = if source.text.chars().count() > 100 {
            format!("{}...", source.text.chars().take(100).collect::<String>())
        } else {
            source.text.clone()
        };
        for (re, label) in generic_patterns() {
            for caps in re.captures_iter(&source.text) {
                let Some(value) = caps.get(1).and_then(|m| parse_number(m.as_str())) else {
                    continue;
                };
                out.push(Endpoint {
                    name: "Endpoint".to_string(),
                    canonical_name: None,
                    description: format!("{} - extracted from publication", label),
                    timepoint: NOT_SPECIFIED.to_string(),
                    arm: Arm::NotSpecified,
                    average_value: Some(value),
                    upper_end: None,
                    lower_end: None,
                    statistical_significance: NOT_SPECIFIED.to_string(),
                    source: Some(source.provenance.clone()),
                    context: Some(context.clone()),
                    tier: Some(Tier::FreeText),
                });
            }
        }
    }
    out
}

// ── Baseline measures ─────────────────────────────────────────────────────────

pub fn extract_baselines(publications: &Publications) -> Vec<BaselineMeasure> {
    let sources = source_texts(publications);
    let normaliser = AliasNormaliser::standard();
    let mut candidates = Vec::new();

    for source in &sources {
        for set in baseline_patterns() {
            for hit in hits(set, &source.text) {
                if !contains_any(hit.context, BASELINE_TERMS) {
                    continue;
                }
                candidates.push(BaselineMeasure {
                    name: set.name.to_string(),
                    canonical_name: Some(normaliser.normalise(set.name)),
                    description: set.description.to_string(),
                    arm: arm_of(hit.context),
                    average_value: Some(hit.value),
                    upper_end: None,
                    lower_end: None,
                    source: Some(source.provenance.clone()),
                    context: Some(hit.context.to_string()),
                    tier: Some(Tier::FreeText),
                });
            }
        }
    }

    let baselines = dedup_candidates(candidates);
    debug!(n = baselines.len(), "free-text baseline measures extracted");
    baselines
}

// ── Context helpers ───────────────────────────────────────────────────────────

fn arm_of(context: &str) -> Arm {
    if contains_any(context, PLACEBO_TERMS) {
        Arm::Placebo
    } else {
        Arm::Intervention
    }
}

fn significance(context: &str) -> String {
    p_value_re()
        .captures(context)
        .and_then(|c| c.get(1))
        .map(|m| format!("p={}", m.as_str()))
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

fn timepoint(context: &str) -> String {
    timepoint_re()
        .find(context)
        .map(|m| capitalise_first(m.as_str()))
        .unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

/// Upper-case the first character, lower-case the rest.
fn capitalise_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

fn last_break(s: &str) -> Option<usize> {
    SENTENCE_BREAKS
        .iter()
        .filter_map(|b| s.rfind(b).map(|i| i + b.len()))
        .max()
}

fn first_break(s: &str) -> Option<usize> {
    SENTENCE_BREAKS.iter().filter_map(|b| s.find(b)).min()
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_boundary(s: &str, i: usize) -> usize {
    let mut i = i.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_common::record::{CompanyPresentation, ScientificPublication};

    fn publication(title: &str, text: &str) -> Publications {
        Publications {
            scientific_publications: vec![ScientificPublication {
                title: title.to_string(),
                snippet: text.to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_pvr_scenario() {
        let pubs = publication(
            "SERAPHIN hemodynamics",
            "PVR decreased by 36.8% (p<0.0001) in the treatment group vs baseline 854",
        );
        let endpoints = extract_endpoints(&pubs);
        let pvr: Vec<_> = endpoints.iter().filter(|e| e.name == "PVR").collect();
        assert_eq!(pvr.len(), 1);
        assert_eq!(pvr[0].average_value, Some(36.8));
        assert_eq!(pvr[0].arm, Arm::Intervention);
        assert_eq!(pvr[0].statistical_significance, "p=0.0001");
        assert_eq!(pvr[0].timepoint, NOT_SPECIFIED);
        assert_eq!(pvr[0].canonical_name.as_deref(), Some("PVR"));
        assert_eq!(
            pvr[0].source.as_deref(),
            Some("Extracted from publication: SERAPHIN hemodynamics")
        );
        assert_eq!(pvr[0].tier, Some(Tier::FreeText));
    }

    #[test]
    fn test_baseline_values_are_not_endpoints() {
        let pubs = publication("Cohort", "Baseline PVR was 854 dyn.");
        let endpoints = extract_endpoints(&pubs);
        assert!(endpoints.iter().all(|e| e.name != "PVR"));

        let baselines = extract_baselines(&pubs);
        let pvr: Vec<_> = baselines.iter().filter(|b| b.name == "PVR").collect();
        assert_eq!(pvr.len(), 1);
        assert_eq!(pvr[0].average_value, Some(854.0));
        assert_eq!(pvr[0].description, "Baseline Pulmonary Vascular Resistance");
    }

    #[test]
    fn test_placebo_arm_and_timepoint() {
        let pubs = publication(
            "Walk study",
            "At week 12 the 6MWD change in the placebo group was -6 m.",
        );
        let endpoints = extract_endpoints(&pubs);
        let walk: Vec<_> = endpoints.iter().filter(|e| e.name == "6MWD").collect();
        assert_eq!(walk.len(), 1);
        assert_eq!(walk[0].arm, Arm::Placebo);
        assert_eq!(walk[0].timepoint, "Week 12");
    }

    #[test]
    fn test_presentation_text_is_used() {
        let pubs = Publications {
            scientific_publications: vec![],
            company_presentations: vec![CompanyPresentation {
                title: "Investor day".to_string(),
                url: "https://example.com/deck.pdf".to_string(),
                text_sample: Some("NT-proBNP reduction of 123 pg/ml".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let endpoints = extract_endpoints(&pubs);
        let bnp = endpoints.iter().find(|e| e.name == "NT-proBNP").unwrap();
        assert_eq!(bnp.average_value, Some(123.0));
        assert_eq!(bnp.source.as_deref(), Some("Extracted from presentation: Investor day"));
    }

    #[test]
    fn test_generic_fallback() {
        let pubs = publication(
            "Unrelated",
            "Hospitalisation decreased by 45% and mortality decreased by 12%.",
        );
        let endpoints = extract_endpoints(&pubs);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name, "Endpoint");
        assert_eq!(endpoints[0].arm, Arm::NotSpecified);
        assert_eq!(endpoints[0].average_value, Some(45.0));
        assert_eq!(endpoints[0].description, "Percent decrease - extracted from publication");
        assert_eq!(endpoints[0].statistical_significance, NOT_SPECIFIED);
    }

    #[test]
    fn test_no_text_no_candidates() {
        assert!(extract_endpoints(&Publications::default()).is_empty());
        assert!(extract_baselines(&publication("Empty", "   ")).is_empty());
    }

    #[test]
    fn test_capitalise_first() {
        assert_eq!(capitalise_first("week 16"), "Week 16");
        assert_eq!(capitalise_first(""), "");
    }
}
