//! Study-level fields of a raw registry document (v2 `protocolSection`).

use serde_json::Value;

use trialscope_common::record::{ArmCounts, DrugDescriptor, StudyInfo, UNKNOWN};
use crate::normalise::drug::{extract_dose, extract_formulation, extract_frequency};

/// Baseline characteristics every pulmonary hypertension record lists.
pub const DEFAULT_BASELINE_CHARACTERISTICS: &[&str] = &[
    "WHO Functional Class",
    "PVR (Pulmonary Vascular Resistance)",
    "6MWD (6-minute walk distance)",
    "NT-proBNP levels",
    "Right heart function",
    "PAH etiology",
];

const DEFAULT_MIN_AGE: u32 = 0;
const DEFAULT_MAX_AGE: u32 = 100;

/// Registry identifier of a raw document, if present.
pub fn nct_id(raw: &Value) -> Option<&str> {
    raw["protocolSection"]["identificationModule"]["nctId"]
        .as_str()
        .filter(|s| !s.is_empty())
}

/// Whether the registry reports posted results for this study.
pub fn has_results(raw: &Value) -> bool {
    raw["hasResults"].as_bool().unwrap_or(false) || raw["resultsSection"].is_object()
}

/// Derive the study descriptor from a raw registry document.
///
/// Missing modules degrade to placeholders; this never fails.
pub fn extract_study_info(raw: &Value) -> StudyInfo {
    let proto = &raw["protocolSection"];
    let id_mod = &proto["identificationModule"];
    let cond_mod = &proto["conditionsModule"];
    let arms_mod = &proto["armsInterventionsModule"];
    let design_mod = &proto["designModule"];
    let elig_mod = &proto["eligibilityModule"];
    let sponsor_mod = &proto["sponsorCollaboratorsModule"];
    let outcomes_mod = &proto["outcomesModule"];

    let indication = cond_mod["conditions"]
        .as_array()
        .and_then(|c| c.first())
        .and_then(|c| c.as_str())
        .unwrap_or("Not specified")
        .to_string();

    // Only the first listed intervention describes the drug.
    let first_intervention = arms_mod["interventions"].as_array().and_then(|iv| iv.first());
    let intervention = first_intervention
        .and_then(|iv| iv["name"].as_str())
        .unwrap_or("")
        .to_string();
    let interventional_drug = first_intervention
        .filter(|iv| iv["type"].as_str().map(|t| t.eq_ignore_ascii_case("drug")).unwrap_or(false))
        .map(|iv| {
            let description = iv["description"].as_str().unwrap_or("");
            DrugDescriptor {
                name: iv["name"].as_str().unwrap_or("").to_string(),
                dose: extract_dose(description),
                frequency: extract_frequency(description),
                formulation: extract_formulation(description),
            }
        })
        .unwrap_or_default();

    let study_arms = count_arms(&arms_mod["arms"]);

    let phase = design_mod["phases"]
        .as_array()
        .and_then(|p| p.first())
        .and_then(|p| p.as_str())
        .unwrap_or(UNKNOWN)
        .to_string();

    let min_age = parse_age(elig_mod["minimumAge"].as_str(), DEFAULT_MIN_AGE);
    let max_age = parse_age(elig_mod["maximumAge"].as_str(), DEFAULT_MAX_AGE);

    let endpoints = ["primaryOutcomes", "secondaryOutcomes"]
        .iter()
        .filter_map(|key| outcomes_mod[*key].as_array())
        .flatten()
        .map(|o| o["measure"].as_str().unwrap_or("").to_string())
        .collect();

    StudyInfo {
        title: id_mod["briefTitle"].as_str().unwrap_or("").to_string(),
        nct_identifier: id_mod["nctId"].as_str().unwrap_or("").to_string(),
        indication,
        intervention,
        interventional_drug,
        phase,
        sponsor: sponsor_mod["leadSponsor"]["name"].as_str().unwrap_or("").to_string(),
        study_arms,
        number_of_participants: design_mod["enrollmentInfo"]["count"].as_u64().unwrap_or(0),
        average_age: (min_age as f64 + max_age as f64) / 2.0,
        age_range: (min_age, max_age),
        endpoints,
        baseline_characteristics: DEFAULT_BASELINE_CHARACTERISTICS
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn count_arms(arms: &Value) -> ArmCounts {
    let mut counts = ArmCounts::default();
    for arm in arms.as_array().into_iter().flatten() {
        let arm_type = arm["type"].as_str().unwrap_or("").to_lowercase();
        if arm_type.contains("experimental") {
            counts.intervention += 1;
        } else if arm_type.contains("placebo") {
            counts.placebo += 1;
        }
    }
    counts
}

/// "18 Years" → 18. Absent or unparseable values fall back to `default`.
fn parse_age(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|v| v.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(default)
}
