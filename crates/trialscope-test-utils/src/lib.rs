//! Test fixtures shared across TrialScope crates.
//!
//! Raw registry documents follow the ClinicalTrials.gov v2 study layout.

use serde_json::{json, Value};

use trialscope_common::record::{
    Arm, BaselineMeasure, Endpoint, Publications, ScientificPublication, StudyInfo, Tier,
    TrialRecord,
};

/// Registry document with protocol fields only, no posted results.
pub fn raw_study(nct_id: &str, sponsor: &str) -> Value {
    json!({
        "protocolSection": {
            "identificationModule": {
                "nctId": nct_id,
                "briefTitle": format!("Efficacy Study {}", nct_id)
            },
            "sponsorCollaboratorsModule": {
                "leadSponsor": { "name": sponsor, "class": "INDUSTRY" }
            },
            "statusModule": { "startDateStruct": { "date": "2019-03" } },
            "conditionsModule": { "conditions": ["Pulmonary Arterial Hypertension"] },
            "designModule": {
                "studyType": "INTERVENTIONAL",
                "phases": ["PHASE3"],
                "enrollmentInfo": { "count": 240 }
            },
            "armsInterventionsModule": {
                "arms": [
                    { "label": "Active", "type": "EXPERIMENTAL" },
                    { "label": "Placebo", "type": "PLACEBO_COMPARATOR" }
                ],
                "interventions": [{
                    "type": "DRUG",
                    "name": "Macitentan",
                    "description": "10 mg tablet taken orally once daily"
                }]
            },
            "eligibilityModule": { "minimumAge": "18 Years", "maximumAge": "80 Years" },
            "outcomesModule": {
                "primaryOutcomes": [{ "measure": "6-Minute Walk Distance" }],
                "secondaryOutcomes": [{ "measure": "Pulmonary Vascular Resistance" }]
            }
        },
        "hasResults": false
    })
}

/// Registry document with posted 6MWD results: +22.0 m active, −8.0 m placebo, p 0.0078.
pub fn raw_study_with_results(nct_id: &str, sponsor: &str) -> Value {
    let mut raw = raw_study(nct_id, sponsor);
    raw["hasResults"] = json!(true);
    raw["resultsSection"] = json!({
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
        }],
        "baselineData": {
            "baselineGroupList": [
                { "id": "BG000", "title": "Experimental Arm" },
                { "id": "BG001", "title": "Placebo" }
            ],
            "baselineMeasureList": [{
                "title": "6MWD",
                "measureParamList": [{ "paramList": [
                    { "groupId": "BG000", "value": "363" },
                    { "groupId": "BG001", "value": "359" }
                ]}]
            }]
        }
    });
    raw
}

/// A publication whose snippet reports a PVR reduction in the active arm.
pub fn pvr_publication() -> ScientificPublication {
    ScientificPublication {
        title: "Haemodynamic effects in pulmonary arterial hypertension".to_string(),
        link: "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC0000001/".to_string(),
        snippet: "At week 16, PVR decreased by 36.8% in the selexipag group (p<0.0001).".to_string(),
        authors: "Smith J, Jones K".to_string(),
        journal: "Eur Respir J".to_string(),
        full_text: None,
        text_length: None,
    }
}

pub fn publications() -> Publications {
    Publications {
        scientific_publications: vec![pvr_publication()],
        company_presentations: Vec::new(),
        extracted_clinical_data: None,
    }
}

pub fn endpoint(name: &str, canonical: &str, arm: Arm, value: Option<f64>, significance: &str) -> Endpoint {
    Endpoint {
        name: name.to_string(),
        canonical_name: Some(canonical.to_string()),
        description: format!("Measurement of {} in patients", name.to_lowercase()),
        timepoint: "Week 24".to_string(),
        arm,
        average_value: value,
        upper_end: None,
        lower_end: None,
        statistical_significance: significance.to_string(),
        source: Some("ClinicalTrials.gov posted results".to_string()),
        context: None,
        tier: Some(Tier::Structured),
    }
}

/// A fully populated record as the pipeline would write it.
pub fn sample_record(nct_id: &str, sponsor: &str) -> TrialRecord {
    TrialRecord {
        clinical_study: StudyInfo {
            title: format!("Efficacy Study {}", nct_id),
            nct_identifier: nct_id.to_string(),
            indication: "Pulmonary Arterial Hypertension".to_string(),
            intervention: "Macitentan".to_string(),
            phase: "PHASE3".to_string(),
            sponsor: sponsor.to_string(),
            number_of_participants: 240,
            average_age: 49.0,
            age_range: (18, 80),
            endpoints: vec!["6-Minute Walk Distance".to_string()],
            ..Default::default()
        },
        sec_filings: Default::default(),
        publications: publications(),
        endpoints: vec![
            endpoint("6-Minute Walk Distance", "6MWD", Arm::Intervention, Some(22.0), "p=0.008"),
            endpoint("6-Minute Walk Distance", "6MWD", Arm::Placebo, Some(-8.0), "p=0.008"),
        ],
        baseline_measures: vec![BaselineMeasure {
            name: "6MWD".to_string(),
            canonical_name: Some("6MWD".to_string()),
            description: "Baseline measurement of 6mwd in patients".to_string(),
            arm: Arm::Intervention,
            average_value: Some(363.0),
            upper_end: None,
            lower_end: None,
            source: Some("ClinicalTrials.gov posted results".to_string()),
            context: None,
            tier: Some(Tier::Structured),
        }],
    }
}
