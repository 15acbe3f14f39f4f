//! Cross-trial endpoint reporting: common endpoints, treatment effects,
//! significance summary and a static HTML report.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use trialscope_common::query::{compare_records, EndpointComparison};
use trialscope_common::record::{Arm, Endpoint, TrialRecord};
use trialscope_common::{DataPaths, Result};
use crate::normalise::AliasNormaliser;
use crate::repository::JsonRecordStore;

pub const REPORT_FILE_NAME: &str = "endpoint_report.html";

// ── Selection ────────────────────────────────────────────────────────────────

/// Stored records that carry endpoints or baseline measures.
pub fn load_reportable(store: &JsonRecordStore) -> Vec<TrialRecord> {
    store
        .load_all()
        .into_iter()
        .filter(TrialRecord::has_outcome_data)
        .collect()
}

fn canonical(endpoint: &Endpoint) -> String {
    match &endpoint.canonical_name {
        Some(c) if !c.is_empty() => c.clone(),
        _ => AliasNormaliser::standard().normalise(&endpoint.name),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointCount {
    pub name: String,
    pub trials: usize,
}

/// Canonical endpoint names by number of trials reporting them.
///
/// Each name counts once per trial. Ties are broken by name.
pub fn find_common_endpoints(records: &[TrialRecord], top_n: usize) -> Vec<EndpointCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let names: HashSet<String> = record
            .endpoints
            .iter()
            .filter(|e| !e.name.is_empty())
            .map(canonical)
            .collect();
        for name in names {
            *counts.entry(name).or_default() += 1;
        }
    }

    let mut ranked: Vec<EndpointCount> = counts
        .into_iter()
        .map(|(name, trials)| EndpointCount { name, trials })
        .collect();
    ranked.sort_by(|a, b| b.trials.cmp(&a.trials).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(top_n);
    ranked
}

/// Rows whose raw endpoint name contains `name` (case-insensitive).
pub fn comparison_rows(records: &[TrialRecord], name: &str, include_placebo: bool) -> Vec<EndpointComparison> {
    compare_records(records, name, include_placebo)
}

/// Rows whose canonical label equals `label`, all arms.
pub fn canonical_rows(records: &[TrialRecord], label: &str) -> Vec<EndpointComparison> {
    records
        .iter()
        .flat_map(|r| {
            r.endpoints
                .iter()
                .filter(|e| canonical(e) == label)
                .map(|e| EndpointComparison::new(&r.clinical_study, e))
        })
        .collect()
}

// ── Treatment effects ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentEffect {
    pub nct_id: String,
    pub study_title: String,
    pub intervention: f64,
    pub placebo: f64,
    /// intervention − placebo
    pub effect: f64,
    pub significance: String,
    pub is_significant: bool,
}

/// Intervention minus placebo per trial, using the first numeric row of each arm.
/// Trials missing either arm are left out.
pub fn treatment_effects(rows: &[EndpointComparison]) -> Vec<TreatmentEffect> {
    let mut order: Vec<&str> = Vec::new();
    let mut arms: HashMap<&str, (Option<&EndpointComparison>, Option<&EndpointComparison>)> = HashMap::new();

    for row in rows.iter().filter(|r| r.value.is_some()) {
        let entry = arms.entry(row.nct_id.as_str()).or_insert_with(|| {
            order.push(row.nct_id.as_str());
            (None, None)
        });
        match row.arm {
            Arm::Intervention if entry.0.is_none() => entry.0 = Some(row),
            Arm::Placebo if entry.1.is_none() => entry.1 = Some(row),
            _ => {}
        }
    }

    order
        .into_iter()
        .filter_map(|nct| {
            let (Some(int_row), Some(pbo_row)) = arms.get(nct).copied()? else { return None };
            let intervention = int_row.value?;
            let placebo = pbo_row.value?;
            Some(TreatmentEffect {
                nct_id: nct.to_string(),
                study_title: int_row.study_title.clone(),
                intervention,
                placebo,
                effect: intervention - placebo,
                significance: int_row.p_value.clone(),
                is_significant: is_significant(&int_row.p_value),
            })
        })
        .collect()
}

// ── Significance ─────────────────────────────────────────────────────────────

fn p_less_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"p\s*<\s*(0?\.\d+)").unwrap())
}

fn p_equals_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"p\s*=\s*(0\.\d+)").unwrap())
}

/// Whether a free-text significance string reports p < 0.05.
pub fn is_significant(significance: &str) -> bool {
    let lower = significance.to_lowercase();
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    if ["p<0.05", "p=0.05", "p<.05"].iter().any(|t| compact.contains(t)) {
        return true;
    }
    let below = |re: &Regex| {
        re.captures(&lower)
            .and_then(|c| c[1].parse::<f64>().ok())
            .is_some_and(|p| p < 0.05)
    };
    below(p_less_regex()) || below(p_equals_regex())
}

// ── Summary table ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub nct_id: String,
    pub title: String,
    pub sponsor: String,
    pub phase: String,
    pub participants: u64,
    /// One cell per entry of [`SummaryTable::endpoints`]: significance or `-`.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTable {
    pub endpoints: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

/// Trials × canonical intervention endpoints.
pub fn summary_table(records: &[TrialRecord]) -> SummaryTable {
    let endpoints: Vec<String> = records
        .iter()
        .flat_map(|r| r.endpoints.iter())
        .filter(|e| e.arm == Arm::Intervention && !e.name.is_empty())
        .map(canonical)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = records
        .iter()
        .map(|r| {
            // last intervention entry per label wins
            let by_label: HashMap<String, &Endpoint> = r
                .endpoints
                .iter()
                .filter(|e| e.arm == Arm::Intervention && !e.name.is_empty())
                .map(|e| (canonical(e), e))
                .collect();
            let study = &r.clinical_study;
            SummaryRow {
                nct_id: study.nct_identifier.clone(),
                title: study.title.clone(),
                sponsor: study.sponsor.clone(),
                phase: study.phase.clone(),
                participants: study.number_of_participants,
                cells: endpoints
                    .iter()
                    .map(|label| {
                        by_label
                            .get(label)
                            .map(|e| e.statistical_significance.clone())
                            .unwrap_or_else(|| "-".to_string())
                    })
                    .collect(),
            }
        })
        .collect();

    SummaryTable { endpoints, rows }
}

// ── HTML ─────────────────────────────────────────────────────────────────────

/// Minimal escaping for text placed inside HTML elements and attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn fmt_value(v: Option<f64>) -> String {
    v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "N/A".to_string())
}

/// Table rows for one endpoint: intervention mean, placebo mean, effect, p-value.
pub fn render_endpoint_rows(rows: &[EndpointComparison]) -> String {
    let mut order: Vec<&str> = Vec::new();
    for row in rows {
        if !order.contains(&row.nct_id.as_str()) {
            order.push(&row.nct_id);
        }
    }

    order
        .iter()
        .map(|nct| {
            let first = |arm: Arm| rows.iter().find(|r| r.nct_id == *nct && r.arm == arm);
            let int_row = first(Arm::Intervention);
            let pbo_row = first(Arm::Placebo);
            let int_value = int_row.and_then(|r| r.value);
            let pbo_value = pbo_row.and_then(|r| r.value);
            let effect = int_value.zip(pbo_value).map(|(i, p)| i - p);
            let p_value = int_row.map(|r| r.p_value.as_str()).unwrap_or("N/A");
            let title = rows
                .iter()
                .find(|r| r.nct_id == *nct)
                .map(|r| r.study_title.as_str())
                .unwrap_or("Unknown");
            let class = if is_significant(p_value) { "significant" } else { "non-significant" };
            format!(
                r#"
            <tr>
                <td>{} ({})</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td class="{}">{}</td>
            </tr>"#,
                escape_html(title),
                escape_html(nct),
                fmt_value(int_value),
                fmt_value(pbo_value),
                fmt_value(effect),
                class,
                escape_html(p_value),
            )
        })
        .collect()
}

/// Render the summary table as an HTML `<table>`.
pub fn render_summary_table(table: &SummaryTable) -> String {
    let header: String = table
        .endpoints
        .iter()
        .map(|e| format!("<th>{}</th>", escape_html(e)))
        .collect();
    let body: String = table
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .cells
                .iter()
                .map(|c| {
                    let class = if is_significant(c) { r#" class="significant""# } else { "" };
                    format!("<td{}>{}</td>", class, escape_html(c))
                })
                .collect();
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td>{}</tr>",
                escape_html(&row.nct_id),
                escape_html(&row.sponsor),
                escape_html(&row.phase),
                cells
            )
        })
        .collect();
    format!(
        r#"<table>
            <tr><th>NCT ID</th><th>Sponsor</th><th>Phase</th>{}</tr>
            {}
        </table>"#,
        header, body
    )
}

/// Full standalone HTML report.
pub fn render_html_report(records: &[TrialRecord], top_n: usize) -> String {
    let common = find_common_endpoints(records, top_n);
    let common_list = if common.is_empty() {
        "None found".to_string()
    } else {
        common.iter().map(|c| escape_html(&c.name)).collect::<Vec<_>>().join(", ")
    };

    let trial_rows: String = records
        .iter()
        .map(|r| {
            let s = &r.clinical_study;
            format!(
                r#"
                <tr>
                    <td>{}</td>
                    <td>{}</td>
                    <td>{}</td>
                    <td>{}</td>
                    <td>{}</td>
                </tr>"#,
                escape_html(&s.nct_identifier),
                escape_html(&s.title),
                escape_html(&s.sponsor),
                escape_html(&s.phase),
                s.number_of_participants
            )
        })
        .collect();

    let endpoint_sections: String = common
        .iter()
        .map(|c| {
            format!(
                r#"
            <h3>Endpoint: {}</h3>
            <table>
                <tr>
                    <th>Trial</th>
                    <th>Intervention (Mean)</th>
                    <th>Placebo (Mean)</th>
                    <th>Effect Size</th>
                    <th>P-value</th>
                </tr>{}
            </table>"#,
                escape_html(&c.name),
                render_endpoint_rows(&canonical_rows(records, &c.name))
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>PAH Clinical Trial Endpoint Analysis</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; line-height: 1.6; }}
        h1, h2, h3 {{ color: #2c3e50; }}
        table {{ border-collapse: collapse; width: 100%; margin-bottom: 20px; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
        tr:nth-child(even) {{ background-color: #f9f9f9; }}
        .summary {{ background-color: #e8f4f8; padding: 15px; border-radius: 5px; margin-bottom: 20px; }}
        .significant {{ color: green; font-weight: bold; }}
        .non-significant {{ color: red; }}
    </style>
</head>
<body>
    <h1>PAH Clinical Trial Endpoint Analysis</h1>
    <div class="summary">
        <h2>Analysis Summary</h2>
        <ul>
            <li><strong>Number of Trials Analyzed:</strong> {}</li>
            <li><strong>Common Endpoints:</strong> {}</li>
        </ul>
    </div>

    <h2>Trial Summary</h2>
    <table>
        <tr>
            <th>NCT ID</th>
            <th>Title</th>
            <th>Sponsor</th>
            <th>Phase</th>
            <th>Participants</th>
        </tr>{}
    </table>

    <h2>Significance by Endpoint</h2>
    {}

    <h2>Detailed Endpoint Analysis</h2>{}
</body>
</html>
"#,
        records.len(),
        common_list,
        trial_rows,
        render_summary_table(&summary_table(records)),
        endpoint_sections
    )
}

/// Render the report and write it under the visualizations directory.
pub fn write_html_report(records: &[TrialRecord], top_n: usize, paths: &DataPaths) -> Result<PathBuf> {
    let dir = paths.visualizations();
    fs::create_dir_all(&dir)?;
    let path = dir.join(REPORT_FILE_NAME);
    fs::write(&path, render_html_report(records, top_n))?;
    info!(path = %path.display(), trials = records.len(), "HTML report written");
    Ok(path)
}
