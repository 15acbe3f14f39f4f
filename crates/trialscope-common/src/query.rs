//! Read-side shapes shared by the JSON store, the database and the API.

use serde::{Deserialize, Serialize};

use crate::record::{Arm, Endpoint, StudyInfo, TrialRecord};

/// Filters and paging for trial listings.
#[derive(Debug, Clone, Deserialize)]
pub struct TrialFilter {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub indication: Option<String>,
    pub sponsor: Option<String>,
}

fn default_limit() -> usize { 10 }

impl Default for TrialFilter {
    fn default() -> Self {
        Self { skip: 0, limit: default_limit(), indication: None, sponsor: None }
    }
}

impl TrialFilter {
    /// Case-insensitive substring match on indication and sponsor.
    pub fn matches(&self, study: &StudyInfo) -> bool {
        contains_ci(&study.indication, self.indication.as_deref())
            && contains_ci(&study.sponsor, self.sponsor.as_deref())
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => haystack.to_lowercase().contains(&n.to_lowercase()),
        None => true,
    }
}

/// One row of a trial listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Database id, or the 1-based position in the JSON store.
    pub id: i64,
    pub title: String,
    pub nct_identifier: String,
    pub indication: String,
    pub intervention: String,
    pub phase: String,
    pub sponsor: String,
    pub number_of_participants: u64,
    pub average_age: f64,
}

impl TrialSummary {
    pub fn from_study(id: i64, study: &StudyInfo) -> Self {
        Self {
            id,
            title: study.title.clone(),
            nct_identifier: study.nct_identifier.clone(),
            indication: study.indication.clone(),
            intervention: study.intervention.clone(),
            phase: study.phase.clone(),
            sponsor: study.sponsor.clone(),
            number_of_participants: study.number_of_participants,
            average_age: study.average_age,
        }
    }
}

/// One endpoint value from one trial, for cross-trial comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointComparison {
    pub nct_id: String,
    pub study_title: String,
    pub sponsor: String,
    pub endpoint_name: String,
    pub arm: Arm,
    pub timepoint: String,
    pub value: Option<f64>,
    pub upper_end: Option<f64>,
    pub lower_end: Option<f64>,
    pub p_value: String,
}

impl EndpointComparison {
    pub fn new(study: &StudyInfo, endpoint: &Endpoint) -> Self {
        Self {
            nct_id: study.nct_identifier.clone(),
            study_title: study.title.clone(),
            sponsor: study.sponsor.clone(),
            endpoint_name: endpoint.name.clone(),
            arm: endpoint.arm,
            timepoint: endpoint.timepoint.clone(),
            value: endpoint.average_value,
            upper_end: endpoint.upper_end,
            lower_end: endpoint.lower_end,
            p_value: endpoint.statistical_significance.clone(),
        }
    }
}

/// Whether an endpoint name matches a comparison query (case-insensitive substring).
pub fn endpoint_matches(endpoint_name: &str, query: &str) -> bool {
    endpoint_name.to_lowercase().contains(&query.to_lowercase())
}

/// Comparison rows for `query` across records, placebo rows only on request.
pub fn compare_records<'a>(
    records: impl IntoIterator<Item = &'a TrialRecord>,
    query: &str,
    include_placebo: bool,
) -> Vec<EndpointComparison> {
    records
        .into_iter()
        .flat_map(|r| {
            r.endpoints
                .iter()
                .filter(|e| endpoint_matches(&e.name, query))
                .filter(|e| include_placebo || e.arm != Arm::Placebo)
                .map(|e| EndpointComparison::new(&r.clinical_study, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_case_insensitively() {
        let study = StudyInfo {
            indication: "Pulmonary Arterial Hypertension".to_string(),
            sponsor: "Actelion".to_string(),
            ..Default::default()
        };
        let mut filter = TrialFilter { indication: Some("arterial".to_string()), ..Default::default() };
        assert!(filter.matches(&study));
        filter.sponsor = Some("MERCK".to_string());
        assert!(!filter.matches(&study));
        filter.sponsor = Some("  ".to_string());
        assert!(filter.matches(&study));
    }

    #[test]
    fn test_filter_defaults() {
        let filter: TrialFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.skip, 0);
        assert_eq!(filter.limit, 10);
    }
}
