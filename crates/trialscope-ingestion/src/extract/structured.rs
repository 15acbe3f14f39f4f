//! Tier 1: posted registry results.
//!
//! Reads outcome measures and baseline characteristics from a raw registry
//! document. Both the flattened legacy layout
//! (`resultsSection.outcomesMeasures[].outcomeDenomList[].categoriesList[].measurementList[]`)
//! and the v2 API layout
//! (`resultsSection.outcomeMeasuresModule.outcomeMeasures[].classes[].categories[].measurements[]`)
//! are accepted.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use trialscope_common::record::{
    coerce_number, parse_number, Arm, BaselineMeasure, Endpoint, Tier, UNKNOWN,
};
use crate::normalise::AliasNormaliser;
use super::{ExtractionTier, TrialInputs};

const INTERVENTION_TERMS: &[&str] = &["intervention", "treatment", "experimental", "active"];
const STRUCTURED_SOURCE: &str = "ClinicalTrials.gov posted results";

/// Structured-results tier for both endpoints and baseline measures.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredTier;

impl ExtractionTier<Endpoint> for StructuredTier {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<Endpoint> {
        extract_endpoints(inputs.raw)
    }
}

impl ExtractionTier<BaselineMeasure> for StructuredTier {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extract(&self, inputs: &TrialInputs<'_>) -> Vec<BaselineMeasure> {
        extract_baselines(inputs.raw)
    }
}

/// Classify an outcome group by its title.
pub fn classify_group(title: &str) -> Arm {
    let lower = title.to_lowercase();
    if lower.contains("placebo") {
        Arm::Placebo
    } else if INTERVENTION_TERMS.iter().any(|t| lower.contains(t)) {
        Arm::Intervention
    } else {
        Arm::Unknown
    }
}

/// `p=<v>` to three decimals when numeric, otherwise the raw text.
pub fn format_p_value(raw: &str) -> String {
    match parse_number(raw) {
        Some(p) => format!("p={:.3}", p),
        None => raw.trim().to_string(),
    }
}

// ── Endpoints ─────────────────────────────────────────────────────────────────

pub fn extract_endpoints(raw: &Value) -> Vec<Endpoint> {
    let results = &raw["resultsSection"];
    let outcomes = first_array(&[
        &results["outcomesMeasures"],
        &results["outcomeMeasuresModule"]["outcomeMeasures"],
    ]);

    let normaliser = AliasNormaliser::standard();
    let mut endpoints = Vec::new();

    for outcome in outcomes {
        let name = outcome["title"].as_str().unwrap_or("").to_string();
        let description = non_empty(outcome["description"].as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("Measurement of {} in patients", name.to_lowercase()));
        let timepoint = non_empty(outcome["timeFrame"].as_str()).unwrap_or(UNKNOWN).to_string();

        let groups = group_arms(first_array(&[&outcome["outcomeGroupList"], &outcome["groups"]]));
        let significance = last_p_value(first_array(&[
            &outcome["outcomeAnalysisList"],
            &outcome["analyses"],
        ]))
        .unwrap_or_else(|| UNKNOWN.to_string());

        let mut measurements = nested(outcome, &["outcomeDenomList", "categoriesList", "measurementList"]);
        if measurements.is_empty() {
            measurements = nested(outcome, &["classes", "categories", "measurements"]);
        }

        for m in measurements {
            let Some(group_id) = non_empty(m["groupId"].as_str()) else { continue };
            if is_blank(&m["value"]) {
                continue;
            }
            endpoints.push(Endpoint {
                name: name.clone(),
                canonical_name: Some(normaliser.normalise(&name)),
                description: description.clone(),
                timepoint: timepoint.clone(),
                arm: groups.get(group_id).copied().unwrap_or(Arm::Unknown),
                average_value: coerce_number(&m["value"]),
                upper_end: None,
                lower_end: None,
                statistical_significance: significance.clone(),
                source: Some(STRUCTURED_SOURCE.to_string()),
                context: None,
                tier: Some(Tier::Structured),
            });
        }
    }

    debug!(n = endpoints.len(), "structured endpoints extracted");
    endpoints
}

// ── Baseline measures ─────────────────────────────────────────────────────────

pub fn extract_baselines(raw: &Value) -> Vec<BaselineMeasure> {
    let results = &raw["resultsSection"];
    let legacy = &results["baselineData"];
    let v2 = &results["baselineCharacteristicsModule"];

    let groups = group_arms(first_array(&[&legacy["baselineGroupList"], &v2["groups"]]));
    let measures = first_array(&[&legacy["baselineMeasureList"], &v2["measures"]]);

    let normaliser = AliasNormaliser::standard();
    let mut baselines = Vec::new();

    for measure in measures {
        let name = measure["title"].as_str().unwrap_or("").to_string();
        let description = non_empty(measure["description"].as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("Baseline measurement of {} in patients", name.to_lowercase()));

        let mut params = nested(measure, &["measureParamList", "paramList"]);
        if params.is_empty() {
            params = nested(measure, &["classes", "categories", "measurements"]);
        }

        for p in params {
            let Some(group_id) = non_empty(p["groupId"].as_str()) else { continue };
            // Baseline rows without a numeric value carry nothing to compare.
            let Some(value) = coerce_number(&p["value"]) else { continue };
            baselines.push(BaselineMeasure {
                name: name.clone(),
                canonical_name: Some(normaliser.normalise(&name)),
                description: description.clone(),
                arm: groups.get(group_id).copied().unwrap_or(Arm::Unknown),
                average_value: Some(value),
                upper_end: None,
                lower_end: None,
                source: Some(STRUCTURED_SOURCE.to_string()),
                context: None,
                tier: Some(Tier::Structured),
            });
        }
    }

    debug!(n = baselines.len(), "structured baseline measures extracted");
    baselines
}

// ── JSON helpers ──────────────────────────────────────────────────────────────

fn group_arms(groups: &[Value]) -> HashMap<&str, Arm> {
    groups
        .iter()
        .filter_map(|g| {
            let id = non_empty(g["id"].as_str())?;
            Some((id, classify_group(g["title"].as_str().unwrap_or(""))))
        })
        .collect()
}

/// Last analysis carrying a p-value wins.
fn last_p_value(analyses: &[Value]) -> Option<String> {
    analyses
        .iter()
        .filter_map(|a| match &a["pValue"] {
            Value::String(s) if !s.trim().is_empty() => Some(format_p_value(s)),
            Value::Number(n) => Some(format_p_value(&n.to_string())),
            _ => None,
        })
        .last()
}

/// First candidate that is a JSON array, or an empty slice.
fn first_array<'a>(candidates: &[&'a Value]) -> &'a [Value] {
    candidates
        .iter()
        .find_map(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// Walk a chain of nested arrays and return the leaf objects.
fn nested<'a>(root: &'a Value, path: &[&str]) -> Vec<&'a Value> {
    let mut level = vec![root];
    for key in path {
        level = level
            .into_iter()
            .flat_map(|v| v[*key].as_array().into_iter().flatten())
            .collect();
    }
    level
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn six_minute_walk_results() -> Value {
        json!({
            "resultsSection": {
                "outcomesMeasures": [{
                    "title": "6-Minute Walk Distance",
                    "timeFrame": "Week 24",
                    "outcomeGroupList": [
                        { "id": "OG000", "title": "Experimental Arm" },
                        { "id": "OG001", "title": "Placebo" }
                    ],
                    "outcomeDenomList": [{
                        "categoriesList": [{
                            "measurementList": [
                                { "groupId": "OG000", "value": "22.0" },
                                { "groupId": "OG001", "value": "-8.0" }
                            ]
                        }]
                    }],
                    "outcomeAnalysisList": [{ "pValue": "0.0078" }]
                }]
            }
        })
    }

    #[test]
    fn test_six_minute_walk_scenario() {
        let endpoints = extract_endpoints(&six_minute_walk_results());
        assert_eq!(endpoints.len(), 2);

        assert_eq!(endpoints[0].name, "6-Minute Walk Distance");
        assert_eq!(endpoints[0].arm, Arm::Intervention);
        assert_eq!(endpoints[0].average_value, Some(22.0));

        assert_eq!(endpoints[1].name, "6-Minute Walk Distance");
        assert_eq!(endpoints[1].arm, Arm::Placebo);
        assert_eq!(endpoints[1].average_value, Some(-8.0));

        for e in &endpoints {
            assert_eq!(e.canonical_name.as_deref(), Some("6MWD"));
            assert_eq!(e.timepoint, "Week 24");
            assert_eq!(e.statistical_significance, "p=0.008");
            assert_eq!(e.description, "Measurement of 6-minute walk distance in patients");
            assert_eq!(e.upper_end, None);
            assert_eq!(e.lower_end, None);
            assert_eq!(e.tier, Some(Tier::Structured));
        }
    }

    #[test]
    fn test_v2_layout_and_unknown_group() {
        let raw = json!({
            "resultsSection": { "outcomeMeasuresModule": { "outcomeMeasures": [{
                "title": "Change in PVR",
                "description": "Right heart catheterisation",
                "groups": [
                    { "id": "OG000", "title": "Selexipag" },
                    { "id": "OG001", "title": "Placebo" }
                ],
                "classes": [{ "categories": [{ "measurements": [
                    { "groupId": "OG000", "value": "-33" },
                    { "groupId": "OG001", "value": "NA" }
                ]}]}],
                "analyses": [{ "pValue": "<0.001" }]
            }]}}
        });
        let endpoints = extract_endpoints(&raw);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].arm, Arm::Unknown);
        assert_eq!(endpoints[0].average_value, Some(-33.0));
        assert_eq!(endpoints[0].timepoint, UNKNOWN);
        assert_eq!(endpoints[0].statistical_significance, "<0.001");
        // Non-numeric values become null, never text.
        assert_eq!(endpoints[1].average_value, None);
    }

    #[test]
    fn test_absent_results_yield_nothing() {
        assert!(extract_endpoints(&json!({ "protocolSection": {} })).is_empty());
        assert!(extract_baselines(&json!({})).is_empty());
    }

    #[test]
    fn test_significance_defaults_to_unknown() {
        let mut raw = six_minute_walk_results();
        raw["resultsSection"]["outcomesMeasures"][0]["outcomeAnalysisList"] = json!([]);
        let endpoints = extract_endpoints(&raw);
        assert!(endpoints.iter().all(|e| e.statistical_significance == UNKNOWN));
    }

    #[test]
    fn test_baselines_skip_non_numeric() {
        let raw = json!({
            "resultsSection": { "baselineData": {
                "baselineGroupList": [
                    { "id": "BG000", "title": "Active Treatment" },
                    { "id": "BG001", "title": "Placebo" }
                ],
                "baselineMeasureList": [{
                    "title": "6MWD",
                    "measureParamList": [{ "paramList": [
                        { "groupId": "BG000", "value": "363" },
                        { "groupId": "BG001", "value": "not reported" }
                    ]}]
                }]
            }}
        });
        let baselines = extract_baselines(&raw);
        assert_eq!(baselines.len(), 1);
        assert_eq!(baselines[0].arm, Arm::Intervention);
        assert_eq!(baselines[0].average_value, Some(363.0));
        assert_eq!(baselines[0].description, "Baseline measurement of 6mwd in patients");
    }

    #[test]
    fn test_classify_group() {
        assert_eq!(classify_group("Placebo + background therapy"), Arm::Placebo);
        assert_eq!(classify_group("Active Comparator"), Arm::Intervention);
        assert_eq!(classify_group("Cohort A"), Arm::Unknown);
    }
}
