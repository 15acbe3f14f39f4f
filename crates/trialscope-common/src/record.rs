//! Canonical per-trial record and its persisted JSON shape.
//!
//! One `TrialRecord` is written per registry identifier as `<NCT>.json`.
//! The record owns its endpoints, baseline measures, filings and
//! publications; nothing is shared between records.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Trial record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialRecord {
    pub clinical_study: StudyInfo,
    #[serde(default, deserialize_with = "filings_by_form")]
    pub sec_filings: BTreeMap<String, Vec<Filing>>,
    #[serde(default)]
    pub publications: Publications,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub baseline_measures: Vec<BaselineMeasure>,
}

impl TrialRecord {
    pub fn nct_id(&self) -> &str {
        &self.clinical_study.nct_identifier
    }

    /// True when the record carries any outcome data worth reporting on.
    pub fn has_outcome_data(&self) -> bool {
        !self.endpoints.is_empty() || !self.baseline_measures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyInfo {
    pub title: String,
    pub nct_identifier: String,
    pub indication: String,
    pub intervention: String,
    pub interventional_drug: DrugDescriptor,
    pub phase: String,
    pub sponsor: String,
    pub study_arms: ArmCounts,
    pub number_of_participants: u64,
    pub average_age: f64,
    /// `[minimum, maximum]` in years.
    pub age_range: (u32, u32),
    /// Outcome measure names as registered (primary first).
    pub endpoints: Vec<String>,
    pub baseline_characteristics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrugDescriptor {
    pub name: String,
    pub dose: String,
    pub frequency: String,
    pub formulation: String,
}

impl Default for DrugDescriptor {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            dose: UNKNOWN.to_string(),
            frequency: UNKNOWN.to_string(),
            formulation: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmCounts {
    pub intervention: u32,
    pub placebo: u32,
}

/// Placeholder used across the record when a value could not be derived.
pub const UNKNOWN: &str = "Unknown";
/// Placeholder used by free-text extraction when a value is absent.
pub const NOT_SPECIFIED: &str = "Not specified";

// ---------------------------------------------------------------------------
// Endpoints and baseline measures
// ---------------------------------------------------------------------------

/// Trial group an extracted value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Arm {
    #[serde(rename = "intervention")]
    Intervention,
    #[serde(rename = "placebo")]
    Placebo,
    /// Used only by generic last-resort entries.
    #[serde(rename = "Not specified")]
    NotSpecified,
    #[default]
    #[serde(rename = "unknown")]
    #[serde(other)]
    Unknown,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Intervention => "intervention",
            Arm::Placebo => "placebo",
            Arm::NotSpecified => NOT_SPECIFIED,
            Arm::Unknown => "unknown",
        }
    }

    /// Inverse of [`Arm::as_str`]; anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "intervention" => Arm::Intervention,
            "placebo" => Arm::Placebo,
            NOT_SPECIFIED => Arm::NotSpecified,
            _ => Arm::Unknown,
        }
    }
}

impl std::fmt::Display for Arm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which fallback tier produced a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Structured,
    FreeText,
    Literature,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Structured => "structured",
            Tier::FreeText => "free_text",
            Tier::Literature => "literature",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "structured" => Some(Tier::Structured),
            "free_text" => Some(Tier::FreeText),
            "literature" => Some(Tier::Literature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timepoint: String,
    #[serde(default)]
    pub arm: Arm,
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub upper_end: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lower_end: Option<f64>,
    #[serde(default)]
    pub statistical_significance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineMeasure {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arm: Arm,
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub upper_end: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub lower_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

/// Coerce a JSON value into a finite float.
///
/// Numbers pass through, numeric strings are parsed (thousands separators
/// allowed), everything else, including NaN and infinities, becomes `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// Parse a numeric string, tolerating surrounding whitespace and commas.
pub fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_number))
}

// ---------------------------------------------------------------------------
// Filings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Filing {
    pub ticker: String,
    pub cik: String,
    pub accession_number: String,
    pub filing_date: String,
    pub form: String,
    pub filing_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_mentions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_mentions: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nct_mentions: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<MentionContext>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MentionContext {
    pub matched_term: String,
    pub context: String,
}

/// Read the `sec_filings` map, keeping only entries that are filing lists.
///
/// Older files carry summary objects next to the per-form lists; those are
/// dropped instead of failing the whole record.
fn filings_by_form<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<Filing>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(form, value)| {
            serde_json::from_value::<Vec<Filing>>(value).ok().map(|filings| (form, filings))
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Publications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Publications {
    pub scientific_publications: Vec<ScientificPublication>,
    pub company_presentations: Vec<CompanyPresentation>,
    /// Keyword hits in the fetched texts; present only when at least one
    /// endpoint or baseline mention was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_clinical_data: Option<ExtractedClinicalData>,
}

impl Publications {
    pub fn is_empty(&self) -> bool {
        self.scientific_publications.is_empty() && self.company_presentations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScientificPublication {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub authors: String,
    pub journal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    /// Characters of fetched text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
}

impl ScientificPublication {
    /// Full text when fetched, otherwise the search snippet.
    pub fn text(&self) -> Option<&str> {
        self.full_text
            .as_deref()
            .or(Some(self.snippet.as_str()))
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyPresentation {
    pub title: String,
    #[serde(alias = "link")]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_sample: Option<String>,
    /// Characters of extracted text before sampling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_length: Option<usize>,
}

/// A keyword found in publication or presentation text, with the text
/// around it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordFinding {
    pub keyword: String,
    pub context: String,
    pub source: String,
}

/// Keyword findings sorted by what their context talks about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedClinicalData {
    pub endpoints: Vec<KeywordFinding>,
    pub baseline_measures: Vec<KeywordFinding>,
    pub other_findings: Vec<KeywordFinding>,
}

impl ExtractedClinicalData {
    pub fn has_measures(&self) -> bool {
        !self.endpoints.is_empty() || !self.baseline_measures.is_empty()
    }
}

impl CompanyPresentation {
    pub fn text(&self) -> Option<&str> {
        self.text_sample.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_record() -> TrialRecord {
        let mut filings = BTreeMap::new();
        filings.insert(
            "10-K".to_string(),
            vec![Filing {
                ticker: "JNJ".to_string(),
                form: "10-K".to_string(),
                filing_date: "2023-02-16".to_string(),
                total_mentions: Some(2),
                name_mentions: Some(1),
                nct_mentions: Some(1),
                contexts: vec![MentionContext {
                    matched_term: "NCT00660179".to_string(),
                    context: "... nct00660179 ...".to_string(),
                }],
                ..Default::default()
            }],
        );

        TrialRecord {
            clinical_study: StudyInfo {
                title: "SERAPHIN".to_string(),
                nct_identifier: "NCT00660179".to_string(),
                indication: "Pulmonary Arterial Hypertension".to_string(),
                phase: "PHASE3".to_string(),
                number_of_participants: 742,
                average_age: 50.0,
                age_range: (12, 88),
                ..Default::default()
            },
            sec_filings: filings,
            publications: Publications {
                scientific_publications: vec![ScientificPublication {
                    title: "Macitentan and morbidity".to_string(),
                    link: "https://www.nejm.org/x".to_string(),
                    snippet: "pvr decreased".to_string(),
                    full_text: Some("full".to_string()),
                    ..Default::default()
                }],
                company_presentations: vec![],
                extracted_clinical_data: Some(ExtractedClinicalData {
                    endpoints: vec![KeywordFinding {
                        keyword: "PVR".to_string(),
                        context: "pvr decreased".to_string(),
                        source: "Scientific publication: Macitentan and morbidity".to_string(),
                    }],
                    ..Default::default()
                }),
            },
            endpoints: vec![Endpoint {
                name: "6-Minute Walk Distance".to_string(),
                canonical_name: Some("6MWD".to_string()),
                description: "Change from baseline".to_string(),
                timepoint: "Week 24".to_string(),
                arm: Arm::Intervention,
                average_value: Some(22.0),
                upper_end: None,
                lower_end: None,
                statistical_significance: "p=0.008".to_string(),
                source: None,
                context: None,
                tier: Some(Tier::Structured),
            }],
            baseline_measures: vec![BaselineMeasure {
                name: "PVR".to_string(),
                canonical_name: Some("PVR".to_string()),
                description: "Baseline Pulmonary Vascular Resistance".to_string(),
                arm: Arm::Placebo,
                average_value: Some(858.0),
                upper_end: Some(899.0),
                lower_end: Some(817.0),
                source: Some("literature".to_string()),
                context: None,
                tier: Some(Tier::Literature),
            }],
        }
    }

    #[test]
    fn test_record_round_trip() {
        let record = sample_record();
        let text = serde_json::to_string_pretty(&record).unwrap();
        let back: TrialRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_non_numeric_values_become_null() {
        let endpoint: Endpoint = serde_json::from_value(json!({
            "name": "PVR",
            "arm": "placebo",
            "average_value": "NA",
            "upper_end": "12.5",
            "lower_end": "1,204",
            "statistical_significance": "p<0.001"
        }))
        .unwrap();
        assert_eq!(endpoint.average_value, None);
        assert_eq!(endpoint.upper_end, Some(12.5));
        assert_eq!(endpoint.lower_end, Some(1204.0));
        assert_eq!(endpoint.arm, Arm::Placebo);
    }

    #[test]
    fn test_unrecognised_arm_reads_as_unknown() {
        let endpoint: Endpoint =
            serde_json::from_value(json!({ "name": "x", "arm": "Cohort B" })).unwrap();
        assert_eq!(endpoint.arm, Arm::Unknown);

        let generic: Endpoint =
            serde_json::from_value(json!({ "name": "Endpoint", "arm": "Not specified" })).unwrap();
        assert_eq!(generic.arm, Arm::NotSpecified);
    }

    #[test]
    fn test_filing_summary_entries_are_skipped() {
        let record: TrialRecord = serde_json::from_value(json!({
            "clinical_study": { "nct_identifier": "NCT01106014" },
            "sec_filings": {
                "10-K": [{ "ticker": "JNJ", "form": "10-K" }],
                "summary": { "company": "Actelion", "total_filings": 1 }
            }
        }))
        .unwrap();
        assert_eq!(record.sec_filings.len(), 1);
        assert_eq!(record.sec_filings["10-K"][0].ticker, "JNJ");
    }

    #[test]
    fn test_coerce_number_rejects_non_finite() {
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!(-8)), Some(-8.0));
        assert_eq!(coerce_number(&json!(null)), None);
    }

    #[test]
    fn test_publication_text_prefers_full_text() {
        let mut publication = ScientificPublication {
            snippet: "snippet".to_string(),
            ..Default::default()
        };
        assert_eq!(publication.text(), Some("snippet"));
        publication.full_text = Some("body".to_string());
        assert_eq!(publication.text(), Some("body"));
    }

    #[test]
    fn test_publications_without_findings() {
        let pubs: Publications = serde_json::from_value(json!({
            "scientific_publications": [{"title": "T", "link": "L", "snippet": "S"}]
        }))
        .unwrap();
        assert_eq!(pubs.extracted_clinical_data, None);
        assert_eq!(pubs.scientific_publications[0].text_length, None);

        let out = serde_json::to_value(&pubs).unwrap();
        assert!(out.get("extracted_clinical_data").is_none());
        assert!(out["scientific_publications"][0].get("text_length").is_none());
    }

    #[test]
    fn test_labels_round_trip() {
        for arm in [Arm::Intervention, Arm::Placebo, Arm::NotSpecified, Arm::Unknown] {
            assert_eq!(Arm::from_label(arm.as_str()), arm);
        }
        assert_eq!(Arm::from_label("Control"), Arm::Unknown);
        assert_eq!(Tier::from_label("free_text"), Some(Tier::FreeText));
        assert_eq!(Tier::from_label(""), None);
    }
}
